//! Raster data structures: georeferenced grids, reference grids and extent masks

mod element;
mod geotransform;
mod grid;
mod reference;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterSummary};
pub use reference::{ExtentMask, ReferenceGrid};
