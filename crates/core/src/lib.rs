//! # Riparia Core
//!
//! Core types, traits and I/O for the riparia riparian-mask toolkit.
//!
//! This crate provides:
//! - `VectorLayer` / `Feature`: immutable vector layers with attributes
//! - `Raster<T>`: Generic raster grid type
//! - `ReferenceGrid` / `ExtentMask`: the snap template output must align to
//! - `CRS`: Coordinate Reference System handling and unit classification
//! - GeoTIFF and GeoJSON I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CrsKind, CRS};
pub use error::{Error, ErrorKind, Result};
pub use raster::{ExtentMask, GeoTransform, Raster, RasterElement, RasterSummary, ReferenceGrid};
pub use vector::{AttributeValue, Feature, GeometryKind, VectorLayer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::raster::{ExtentMask, GeoTransform, Raster, RasterElement, ReferenceGrid};
    pub use crate::vector::{AttributeValue, Feature, GeometryKind, VectorLayer};
}
