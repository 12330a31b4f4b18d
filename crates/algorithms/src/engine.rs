//! Layer-level geometry operations
//!
//! [`GeometryEngine`] is the one seam between the riparian pipeline and
//! the geometry code: buffer, erase, merge and rasterize over whole
//! layers. [`GeoEngine`] implements it on top of the `vector` primitives
//! and the grid rasterizer. Every geometry is validated (repaired or
//! rejected) before it reaches a boolean operation.

use crate::maybe_rayon::*;
use crate::rasterize::rasterize_layer;
use crate::vector::{
    buffer_geometry, lineal_geometry, polygonal_geometry, to_multi_line_string, to_multi_polygon,
    union_all, validate_layer, BufferParams, BufferSpec, Eraser, InvalidGeometryPolicy,
};
use riparia_core::raster::{ExtentMask, Raster, ReferenceGrid};
use riparia_core::vector::{Feature, GeometryKind, VectorLayer};
use riparia_core::{Error, Result};
use tracing::debug;

/// Layer-level geometry operations used by the pipeline.
///
/// Every operation is pure: inputs are borrowed, a new layer is returned.
pub trait GeometryEngine: Send + Sync {
    /// Grow every feature by its resolved distance (meters). The result
    /// is a polygon layer named `name`; attributes are kept.
    fn buffer(&self, layer: &VectorLayer, spec: &BufferSpec, name: &str) -> Result<VectorLayer>;

    /// `layer` minus the area covered by the polygon layer `eraser`.
    /// Fully consumed features are dropped; an empty eraser returns the
    /// layer unchanged.
    fn erase(&self, layer: &VectorLayer, eraser: &VectorLayer, name: &str) -> Result<VectorLayer>;

    /// Union of one or more layers of the same kind.
    fn merge(&self, layers: &[&VectorLayer], name: &str) -> Result<VectorLayer>;

    /// Burn a polygon layer onto a reference grid.
    fn rasterize(
        &self,
        layer: &VectorLayer,
        grid: &ReferenceGrid,
        extent: Option<&ExtentMask>,
    ) -> Result<Raster<u8>>;
}

/// [`GeometryEngine`] backed by the `geo` crate
#[derive(Debug, Clone)]
pub struct GeoEngine {
    /// Vertices per full circle for round caps and joins
    pub arc_segments: usize,
    /// Polygon parts smaller than this (m²) are dropped after an erase
    pub sliver_area_m2: f64,
    /// What to do with invalid input geometry
    pub invalid_geometry: InvalidGeometryPolicy,
}

impl Default for GeoEngine {
    fn default() -> Self {
        Self {
            arc_segments: 64,
            sliver_area_m2: 0.01,
            invalid_geometry: InvalidGeometryPolicy::Repair,
        }
    }
}

impl GeometryEngine for GeoEngine {
    fn buffer(&self, layer: &VectorLayer, spec: &BufferSpec, name: &str) -> Result<VectorLayer> {
        spec.check(layer.len())?;
        let mpu = layer.crs().meters_per_unit()?;
        let layer = validate_layer(layer, self.invalid_geometry)?;

        let buffered = layer
            .features()
            .par_iter()
            .enumerate()
            .map(|(i, feature)| {
                let distance = spec.distance(i).unwrap_or(0.0) / mpu;
                let params = BufferParams {
                    distance,
                    segments: self.arc_segments,
                };
                let geometry = polygonal_geometry(buffer_geometry(&feature.geometry, &params));
                if geometry.is_none() {
                    debug!(
                        "{}: feature {} has no area at distance {}, dropped",
                        layer.name(),
                        feature.id().unwrap_or("<unnamed>"),
                        distance
                    );
                }
                geometry.map(|g| feature.with_geometry(g))
            })
            .collect::<Vec<_>>();

        let features: Vec<Feature> = buffered.into_iter().flatten().collect();
        debug!("{}: buffered {} of {} features", name, features.len(), layer.len());
        layer.derive(name, GeometryKind::Polygon, features)
    }

    fn erase(&self, layer: &VectorLayer, eraser: &VectorLayer, name: &str) -> Result<VectorLayer> {
        layer.ensure_same_crs(eraser)?;
        if eraser.kind() != GeometryKind::Polygon {
            return Err(Error::InvalidParameter {
                name: "eraser",
                value: eraser.name().to_string(),
                reason: "can only erase with a polygon layer".into(),
            });
        }
        if eraser.is_empty() {
            debug!("{}: eraser {} is empty, layer unchanged", name, eraser.name());
            return Ok(layer.clone().renamed(name));
        }

        let mpu = layer.crs().meters_per_unit()?;
        let min_area = self.sliver_area_m2 / (mpu * mpu);
        let layer = validate_layer(layer, self.invalid_geometry)?;
        let eraser = validate_layer(eraser, self.invalid_geometry)?;

        let eraser = Eraser::new(eraser.iter().map(|f| to_multi_polygon(&f.geometry)).collect());
        let kind = layer.kind();

        let remaining = layer
            .features()
            .par_iter()
            .map(|feature| {
                let geometry = match kind {
                    GeometryKind::Polygon => {
                        polygonal_geometry(eraser.erase_polygons(&to_multi_polygon(&feature.geometry), min_area))
                    }
                    GeometryKind::Line => {
                        lineal_geometry(eraser.erase_lines(&to_multi_line_string(&feature.geometry), 0.0))
                    }
                };
                if geometry.is_none() {
                    debug!(
                        "{}: feature {} fully erased",
                        layer.name(),
                        feature.id().unwrap_or("<unnamed>")
                    );
                }
                geometry.map(|g| feature.with_geometry(g))
            })
            .collect::<Vec<_>>();

        let features: Vec<Feature> = remaining.into_iter().flatten().collect();
        debug!(
            "{}: {} of {} features remain after erasing {} components",
            name,
            features.len(),
            layer.len(),
            eraser.component_count()
        );
        layer.derive(name, kind, features)
    }

    fn merge(&self, layers: &[&VectorLayer], name: &str) -> Result<VectorLayer> {
        let Some(first) = layers.first() else {
            return Err(Error::InvalidParameter {
                name: "layers",
                value: "0".into(),
                reason: "merge needs at least one layer".into(),
            });
        };
        for layer in &layers[1..] {
            first.ensure_same_crs(layer)?;
            if layer.kind() != first.kind() {
                return Err(Error::InvalidParameter {
                    name: "layers",
                    value: layer.name().to_string(),
                    reason: format!("cannot merge {} layer into {} layer", layer.kind(), first.kind()),
                });
            }
        }

        let validated = layers
            .iter()
            .map(|l| validate_layer(l, self.invalid_geometry))
            .collect::<Result<Vec<_>>>()?;

        match first.kind() {
            // Lines have no area to dissolve
            GeometryKind::Line => {
                let features = validated.into_iter().flat_map(VectorLayer::into_features).collect();
                first.derive(name, GeometryKind::Line, features)
            }
            GeometryKind::Polygon => {
                let parts = validated
                    .iter()
                    .flat_map(|l| l.iter().map(|f| to_multi_polygon(&f.geometry)))
                    .collect();
                let features = union_all(parts)
                    .0
                    .into_iter()
                    .enumerate()
                    .map(|(i, p)| Feature::new(p).with_id(format!("{}:{}", name, i)))
                    .collect::<Vec<_>>();
                debug!("{}: dissolved into {} components", name, features.len());
                first.derive(name, GeometryKind::Polygon, features)
            }
        }
    }

    fn rasterize(
        &self,
        layer: &VectorLayer,
        grid: &ReferenceGrid,
        extent: Option<&ExtentMask>,
    ) -> Result<Raster<u8>> {
        rasterize_layer(layer, grid, extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::area;
    use approx::assert_relative_eq;
    use geo::{line_string, polygon};
    use riparia_core::vector::AttributeValue;
    use riparia_core::{ErrorKind, CRS};

    fn square(x: f64, y: f64, size: f64) -> Feature {
        Feature::new(polygon![
            (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size),
        ])
    }

    fn polygons(features: Vec<Feature>) -> VectorLayer {
        VectorLayer::new("polys", GeometryKind::Polygon, CRS::conus_albers(), features).unwrap()
    }

    fn total_area(layer: &VectorLayer) -> f64 {
        layer.iter().map(|f| area(&f.geometry)).sum()
    }

    #[test]
    fn test_erase_self_is_empty() {
        let engine = GeoEngine::default();
        let layer = polygons(vec![square(0.0, 0.0, 10.0), square(5.0, 5.0, 10.0), square(50.0, 0.0, 3.0)]);
        let rest = engine.erase(&layer, &layer, "rest").unwrap();
        assert!(rest.is_empty(), "{} features left", rest.len());
    }

    #[test]
    fn test_erase_empty_eraser_is_identity() {
        let engine = GeoEngine::default();
        let layer = polygons(vec![square(0.0, 0.0, 10.0).with_id("a")]);
        let empty = VectorLayer::empty("none", GeometryKind::Polygon, CRS::conus_albers());

        let rest = engine.erase(&layer, &empty, "rest").unwrap();
        assert_eq!(rest.name(), "rest");
        assert_eq!(rest.features()[0].geometry, layer.features()[0].geometry);
    }

    #[test]
    fn test_merge_with_empty() {
        let engine = GeoEngine::default();
        let layer = polygons(vec![square(0.0, 0.0, 10.0), square(30.0, 0.0, 10.0)]);
        let empty = VectorLayer::empty("none", GeometryKind::Polygon, CRS::conus_albers());

        let merged = engine.merge(&[&layer, &empty], "merged").unwrap();
        assert_eq!(merged.len(), 2);
        assert_relative_eq!(total_area(&merged), total_area(&layer), epsilon = 1e-3);
        assert!(engine.erase(&merged, &layer, "diff").unwrap().is_empty());
        assert!(engine.erase(&layer, &merged, "diff").unwrap().is_empty());
    }

    #[test]
    fn test_merge_dissolves_overlap() {
        let engine = GeoEngine::default();
        let a = polygons(vec![square(0.0, 0.0, 10.0)]);
        let b = polygons(vec![square(5.0, 0.0, 10.0)]);

        let merged = engine.merge(&[&a, &b], "merged").unwrap();
        assert_eq!(merged.len(), 1);
        assert_relative_eq!(total_area(&merged), 150.0, epsilon = 1e-3);
        assert_eq!(merged.features()[0].id(), Some("merged:0"));
    }

    #[test]
    fn test_merge_mixed_kinds_rejected() {
        let engine = GeoEngine::default();
        let a = polygons(vec![square(0.0, 0.0, 10.0)]);
        let b = VectorLayer::empty("lines", GeometryKind::Line, CRS::conus_albers());
        assert!(engine.merge(&[&a, &b], "merged").is_err());
        assert!(engine.merge(&[], "merged").is_err());
    }

    #[test]
    fn test_buffer_keeps_attributes() {
        let engine = GeoEngine::default();
        let streams = VectorLayer::new(
            "streams",
            GeometryKind::Line,
            CRS::conus_albers(),
            vec![Feature::new(line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)])
                .with_id("s1")
                .with_property("channel_width", AttributeValue::Float(20.0))],
        )
        .unwrap();

        let buffered = engine.buffer(&streams, &BufferSpec::Fixed(40.0), "corridor").unwrap();
        assert_eq!(buffered.kind(), GeometryKind::Polygon);
        assert_eq!(buffered.features()[0].id(), Some("s1"));
        assert_eq!(
            buffered.features()[0].get_property("channel_width"),
            Some(&AttributeValue::Float(20.0))
        );
    }

    #[test]
    fn test_buffer_converts_feet() {
        let engine = GeoEngine::default();
        let feet = CRS::from_epsg(2248);
        let mpu = feet.meters_per_unit().unwrap();
        let layer = VectorLayer::new(
            "lines",
            GeometryKind::Line,
            feet,
            vec![Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)])],
        )
        .unwrap();

        let buffered = engine.buffer(&layer, &BufferSpec::Fixed(30.0), "b").unwrap();
        let half_width = 30.0 / mpu;
        let expected = 1000.0 * 2.0 * half_width + std::f64::consts::PI * half_width * half_width;
        let got = total_area(&buffered);
        assert!((got - expected).abs() / expected < 0.01, "{} vs {}", got, expected);
    }

    #[test]
    fn test_geographic_buffer_is_unit_mismatch() {
        let engine = GeoEngine::default();
        let layer = VectorLayer::empty("lines", GeometryKind::Line, CRS::wgs84());
        let err = engine.buffer(&layer, &BufferSpec::Fixed(30.0), "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnitMismatch);
    }

    #[test]
    fn test_erase_lines_keeps_attributes() {
        let engine = GeoEngine::default();
        let streams = VectorLayer::new(
            "streams",
            GeometryKind::Line,
            CRS::conus_albers(),
            vec![
                Feature::new(line_string![(x: 0.0, y: 5.0), (x: 100.0, y: 5.0)])
                    .with_property("channel_width", AttributeValue::Int(6)),
                Feature::new(line_string![(x: 20.0, y: 2.0), (x: 30.0, y: 2.0)]),
            ],
        )
        .unwrap();
        let eraser = polygons(vec![square(10.0, 0.0, 40.0)]);

        let rest = engine.erase(&streams, &eraser, "rest").unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(
            rest.features()[0].get_property("channel_width"),
            Some(&AttributeValue::Int(6))
        );
        assert!(matches!(rest.features()[0].geometry, geo::Geometry::MultiLineString(_)));
    }

    #[test]
    fn test_invalid_geometry_rejected_by_policy() {
        let engine = GeoEngine {
            invalid_geometry: InvalidGeometryPolicy::Reject,
            ..GeoEngine::default()
        };
        let bowtie = polygons(vec![Feature::new(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0),
        ])
        .with_id("bad")]);

        let err = engine.buffer(&bowtie, &BufferSpec::Fixed(1.0), "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
    }

    #[test]
    fn test_merge_nested_parts_keeps_outer_area() {
        let engine = GeoEngine::default();
        let nested = geo::MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)],
            polygon![(x: 40.0, y: 40.0), (x: 60.0, y: 40.0), (x: 60.0, y: 60.0), (x: 40.0, y: 60.0)],
        ]);
        let layer = polygons(vec![Feature::new(nested)]);

        let merged = engine.merge(&[&layer], "merged").unwrap();
        assert_eq!(merged.len(), 1);
        assert_relative_eq!(total_area(&merged), 10_000.0, epsilon = 1e-3);
    }
}
