//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS). Riparian masks are
/// `Raster<u8>` with 1 = riparian and 0 = not riparian.
///
/// # Example
///
/// ```ignore
/// use riparia_core::Raster;
///
/// let mut mask: Raster<u8> = Raster::new(100, 100);
/// mask.set(10, 20, 1)?;
/// assert_eq!(mask.get(10, 20)?, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster has no cells
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            }),
        }
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Value of the cell containing map point (x, y), if inside the raster
    pub fn value_at(&self, x: f64, y: f64) -> Option<T> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        self.data.get((row.floor() as usize, col.floor() as usize)).copied()
    }

    /// Count valid, no-data and non-zero cells
    pub fn summary(&self) -> RasterSummary {
        let mut valid_count = 0;
        let mut nonzero_count = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            valid_count += 1;
            if !value.is_zero() {
                nonzero_count += 1;
            }
        }

        RasterSummary {
            valid_count,
            nodata_count: self.len() - valid_count,
            nonzero_count,
        }
    }
}

/// Cell counts for a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSummary {
    pub valid_count: usize,
    pub nodata_count: usize,
    pub nonzero_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<u8> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<u8> = Raster::new(10, 10);
        raster.set(5, 5, 1).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 1);
        assert!(raster.set(10, 0, 1).is_err());
    }

    #[test]
    fn test_value_at() {
        let mut raster: Raster<u8> = Raster::new(4, 4);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        raster.set(1, 2, 7).unwrap();

        assert_eq!(raster.value_at(25.0, 25.0), Some(7));
        assert_eq!(raster.value_at(5.0, 35.0), Some(0));
        assert_eq!(raster.value_at(-1.0, 35.0), None);
        assert_eq!(raster.value_at(45.0, 35.0), None);
    }

    #[test]
    fn test_summary() {
        let mut raster: Raster<u8> = Raster::new(3, 3);
        raster.set_nodata(Some(255));
        raster.set(0, 0, 1).unwrap();
        raster.set(0, 1, 1).unwrap();
        raster.set(2, 2, 255).unwrap();

        let summary = raster.summary();
        assert_eq!(summary.valid_count, 8);
        assert_eq!(summary.nodata_count, 1);
        assert_eq!(summary.nonzero_count, 2);
    }
}
