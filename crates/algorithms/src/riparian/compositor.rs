//! The three intermediate riparian layers
//!
//! Each source group goes through a fixed buffer/erase sequence:
//!
//! ```text
//! shoreline:  merged = merge(A, B); buffer = buffer(merged, w); riparian = erase(buffer, merged)
//! water:      water = merge(filter(lotic, area >= min), reservoirs)
//!             buffer = buffer(water, w); riparian = erase(buffer, water)
//! streams:    rest = erase(erase(streams, shoreline buffer), water buffer)
//!             riparian = buffer(rest, channel_width / 2 + w)
//! ```
//!
//! Streams are erased by the *buffered* shoreline and water, so stream
//! corridors never re-expand into area the other two layers already claim.

use crate::engine::GeometryEngine;
use crate::riparian::config::RiparianConfig;
use crate::riparian::width::WidthCalculator;
use crate::vector::{filter_layer, AreaAtLeast, AttributeIn, BufferSpec, FeaturePredicate};
use riparia_core::vector::VectorLayer;
use riparia_core::Result;
use tracing::{debug, info};

/// Shoreline group artifacts
#[derive(Debug, Clone)]
pub struct ShorelineLayers {
    /// Both shoreline sources dissolved together
    pub merged: VectorLayer,
    pub buffer: VectorLayer,
    /// Buffer with the shoreline polygons themselves removed
    pub riparian: VectorLayer,
}

/// Water group artifacts
#[derive(Debug, Clone)]
pub struct WaterLayers {
    /// Large lotic water plus reservoirs, dissolved
    pub water: VectorLayer,
    pub buffer: VectorLayer,
    /// Buffer with the water polygons themselves removed
    pub riparian: VectorLayer,
}

/// Stream group artifacts
#[derive(Debug, Clone)]
pub struct StreamLayers {
    /// Streams outside the shoreline buffer
    pub outside_shoreline: VectorLayer,
    /// ... and outside the water buffer
    pub outside_water: VectorLayer,
    /// Variable-width corridors around the remaining streams
    pub riparian: VectorLayer,
}

/// Builds the intermediate layers with a geometry engine
pub struct LayerCompositor<'a, E: GeometryEngine + ?Sized> {
    engine: &'a E,
    config: &'a RiparianConfig,
}

impl<'a, E: GeometryEngine + ?Sized> LayerCompositor<'a, E> {
    pub fn new(engine: &'a E, config: &'a RiparianConfig) -> Self {
        Self { engine, config }
    }

    fn fixed_buffer(&self) -> BufferSpec {
        BufferSpec::Fixed(self.config.buffer_distance_m)
    }

    /// Merge, buffer and erase the two shoreline layers
    pub fn shoreline(&self, a: &VectorLayer, b: &VectorLayer) -> Result<ShorelineLayers> {
        let merged = self.engine.merge(&[a, b], "shoreline")?;
        let buffer = self.engine.buffer(&merged, &self.fixed_buffer(), "shoreline_buffer")?;
        let riparian = self.engine.erase(&buffer, &merged, "shoreline_riparian")?;
        info!(
            "shoreline: {} components, {} riparian features",
            merged.len(),
            riparian.len()
        );

        Ok(ShorelineLayers {
            merged,
            buffer,
            riparian,
        })
    }

    /// Select lotic water above the area threshold and all reservoirs.
    pub fn select_water(&self, water: &VectorLayer) -> Result<VectorLayer> {
        let big_enough = AreaAtLeast::acres(self.config.lotic_min_acres);

        let Some(field) = self.config.water_class() else {
            let lotic = filter_layer(water, &big_enough, "lotic_water")?;
            return self.engine.merge(&[&lotic], "water");
        };

        let lotic_class = AttributeIn::new(field, self.config.lotic_codes.clone());
        let lotic = filter_layer(water, &lotic_class.and(big_enough), "lotic_water")?;
        let reservoirs = filter_layer(
            water,
            &AttributeIn::new(field, self.config.reservoir_codes.clone()),
            "reservoirs",
        )?;
        debug!(
            "water: {} lotic features of {} acres or more, {} reservoirs, {} excluded",
            lotic.len(),
            self.config.lotic_min_acres,
            reservoirs.len(),
            water.len().saturating_sub(lotic.len() + reservoirs.len())
        );

        self.engine.merge(&[&lotic, &reservoirs], "water")
    }

    /// Filter, merge, buffer and erase the water layer
    pub fn water(&self, water: &VectorLayer) -> Result<WaterLayers> {
        let water = self.select_water(water)?;
        let buffer = self.engine.buffer(&water, &self.fixed_buffer(), "water_buffer")?;
        let riparian = self.engine.erase(&buffer, &water, "water_riparian")?;
        info!(
            "water: {} components, {} riparian features",
            water.len(),
            riparian.len()
        );

        Ok(WaterLayers {
            water,
            buffer,
            riparian,
        })
    }

    /// Erase both buffers from the streams, then buffer what is left by
    /// each stream's own width
    pub fn streams(
        &self,
        streams: &VectorLayer,
        shoreline_buffer: &VectorLayer,
        water_buffer: &VectorLayer,
    ) -> Result<StreamLayers> {
        let outside_shoreline = self
            .engine
            .erase(streams, shoreline_buffer, "streams_shoreline_erase")?;
        let outside_water = self
            .engine
            .erase(&outside_shoreline, water_buffer, "streams_water_erase")?;
        let riparian = WidthCalculator::from_config(self.config).buffer(
            self.engine,
            &outside_water,
            "stream_riparian",
        )?;
        info!(
            "streams: {} of {} features outside shoreline and water buffers",
            outside_water.len(),
            streams.len()
        );

        Ok(StreamLayers {
            outside_shoreline,
            outside_water,
            riparian,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use crate::vector::{area, SQUARE_METERS_PER_ACRE};
    use geo::{line_string, polygon};
    use riparia_core::vector::{AttributeValue, Feature, GeometryKind};
    use riparia_core::CRS;

    fn square(x: f64, side: f64) -> Feature {
        Feature::new(polygon![
            (x: x, y: 0.0), (x: x + side, y: 0.0), (x: x + side, y: side), (x: x, y: side),
        ])
    }

    fn water_parcel(x: f64, acres: f64, code: i64) -> Feature {
        square(x, (acres * SQUARE_METERS_PER_ACRE).sqrt()).with_property("lu_code", AttributeValue::Int(code))
    }

    fn polygons(name: &str, features: Vec<Feature>) -> VectorLayer {
        VectorLayer::new(name, GeometryKind::Polygon, CRS::conus_albers(), features).unwrap()
    }

    #[test]
    fn test_water_selection() {
        let config = RiparianConfig::default();
        let engine = GeoEngine::default();
        let compositor = LayerCompositor::new(&engine, &config);

        let water = polygons(
            "water",
            vec![
                water_parcel(0.0, 10.0, 1300),
                water_parcel(2000.0, 30.0, 1300),
                water_parcel(4000.0, 1.0, 1210),
                water_parcel(6000.0, 100.0, 2100),
            ],
        );
        let selected = compositor.select_water(&water).unwrap();

        let acres: f64 = selected.iter().map(|f| area(&f.geometry)).sum::<f64>() / SQUARE_METERS_PER_ACRE;
        assert_eq!(selected.len(), 2);
        assert!((acres - 31.0).abs() < 1e-3, "{acres}");
    }

    #[test]
    fn test_water_without_class_field() {
        let config = RiparianConfig {
            water_class_field: None,
            ..RiparianConfig::default()
        };
        let engine = GeoEngine::default();
        let compositor = LayerCompositor::new(&engine, &config);

        let water = polygons("water", vec![water_parcel(0.0, 10.0, 1210), water_parcel(2000.0, 30.0, 0)]);
        assert_eq!(compositor.select_water(&water).unwrap().len(), 1);
    }

    #[test]
    fn test_shoreline_ring() {
        let config = RiparianConfig::default();
        let engine = GeoEngine::default();
        let compositor = LayerCompositor::new(&engine, &config);

        let a = polygons("vims", vec![square(0.0, 100.0)]);
        let b = polygons("de", vec![]);
        let layers = compositor.shoreline(&a, &b).unwrap();

        let ring_area: f64 = layers.riparian.iter().map(|f| area(&f.geometry)).sum();
        let expected = 4.0 * 100.0 * 30.0 + std::f64::consts::PI * 900.0;
        assert!((ring_area - expected).abs() / expected < 0.01, "{ring_area}");
    }

    #[test]
    fn test_empty_groups() {
        let config = RiparianConfig::default();
        let engine = GeoEngine::default();
        let compositor = LayerCompositor::new(&engine, &config);

        let empty = polygons("none", vec![]);
        let shoreline = compositor.shoreline(&empty, &empty).unwrap();
        let water = compositor.water(&empty).unwrap();
        assert!(shoreline.riparian.is_empty());
        assert!(water.riparian.is_empty());

        let streams = VectorLayer::new(
            "streams",
            GeometryKind::Line,
            CRS::conus_albers(),
            vec![Feature::new(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)])
                .with_property("channel_width", AttributeValue::Float(2.0))],
        )
        .unwrap();
        let layers = compositor.streams(&streams, &shoreline.buffer, &water.buffer).unwrap();
        assert_eq!(layers.outside_water.len(), 1);
        assert_eq!(layers.riparian.len(), 1);
    }
}
