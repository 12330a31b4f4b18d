//! Composite riparian mask

use crate::engine::GeometryEngine;
use riparia_core::io::write_vector_layer;
use riparia_core::vector::VectorLayer;
use riparia_core::Result;
use std::path::{Path, PathBuf};

/// Dissolved union of the three intermediate riparian layers.
///
/// Source attributes are not carried: the mask is only ever read as
/// inside/outside.
#[derive(Debug, Clone)]
pub struct CompositeMask(VectorLayer);

impl CompositeMask {
    pub fn layer(&self) -> &VectorLayer {
        &self.0
    }

    pub fn into_layer(self) -> VectorLayer {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write the mask as GeoJSON
    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        write_vector_layer(&self.0, path)
    }
}

/// Where the vector mask for raster `output` goes: `<stem>_vector.geojson`
/// in the same directory
pub fn vector_mask_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "riparian".to_string());
    output.with_file_name(format!("{}_vector.geojson", stem))
}

/// Merge the shoreline, water and stream riparian layers into one mask
pub fn assemble<E: GeometryEngine + ?Sized>(
    engine: &E,
    shoreline: &VectorLayer,
    water: &VectorLayer,
    streams: &VectorLayer,
) -> Result<CompositeMask> {
    engine
        .merge(&[shoreline, water, streams], "riparian_vector")
        .map(CompositeMask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use crate::vector::area;
    use geo::polygon;
    use riparia_core::io::read_vector_layer;
    use riparia_core::vector::{AttributeValue, Feature, GeometryKind};
    use riparia_core::CRS;

    fn layer(name: &str, x: f64) -> VectorLayer {
        let f = Feature::new(polygon![
            (x: x, y: 0.0), (x: x + 10.0, y: 0.0), (x: x + 10.0, y: 10.0), (x: x, y: 10.0),
        ])
        .with_property("source", AttributeValue::String(name.into()));
        VectorLayer::new(name, GeometryKind::Polygon, CRS::conus_albers(), vec![f]).unwrap()
    }

    #[test]
    fn test_overlapping_sources_dissolve() {
        let engine = GeoEngine::default();
        let mask = assemble(&engine, &layer("a", 0.0), &layer("b", 5.0), &layer("c", 100.0)).unwrap();

        assert_eq!(mask.layer().name(), "riparian_vector");
        assert_eq!(mask.layer().len(), 2);
        let total: f64 = mask.layer().iter().map(|f| area(&f.geometry)).sum();
        assert!((total - 250.0).abs() < 1e-3, "{total}");
        assert!(mask.layer().iter().all(|f| f.properties.is_empty()));
    }

    #[test]
    fn test_all_empty() {
        let engine = GeoEngine::default();
        let empty = VectorLayer::empty("none", GeometryKind::Polygon, CRS::conus_albers());
        assert!(assemble(&engine, &empty, &empty, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_vector_mask_path() {
        assert_eq!(
            vector_mask_path(Path::new("out/riparian_10m.tif")),
            PathBuf::from("out/riparian_10m_vector.geojson")
        );
        assert_eq!(vector_mask_path(Path::new("mask")), PathBuf::from("mask_vector.geojson"));
    }

    #[test]
    fn test_write_mask_next_to_raster() {
        let engine = GeoEngine::default();
        let mask = assemble(&engine, &layer("a", 0.0), &layer("b", 5.0), &layer("c", 100.0)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = vector_mask_path(&dir.path().join("riparian_10m.tif"));
        mask.write_geojson(&path).unwrap();

        assert!(dir.path().join("riparian_10m_vector.geojson").exists());
        let back = read_vector_layer(&path, "riparian_vector", GeometryKind::Polygon, &CRS::conus_albers()).unwrap();
        assert_eq!(back.len(), 2);
    }
}
