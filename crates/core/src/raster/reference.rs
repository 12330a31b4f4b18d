//! Reference grids and extent masks
//!
//! A [`ReferenceGrid`] is the snap template every output raster aligns to:
//! an origin, a cell size, a CRS and the extent it covers. Any grid derived
//! from it (a coarser cell size, a window) keeps its cell boundaries on the
//! reference lattice `origin + k * cell_size`.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};

/// Relative tolerance when checking that cell sizes line up.
const ALIGN_TOLERANCE: f64 = 1e-9;

/// North-up grid template that output rasters must align to.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGrid {
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    crs: Option<CRS>,
}

impl ReferenceGrid {
    /// Create a reference grid, rejecting transforms that cannot define a lattice.
    pub fn new(transform: GeoTransform, rows: usize, cols: usize, crs: Option<CRS>) -> Result<Self> {
        if !transform.origin_x.is_finite() || !transform.origin_y.is_finite() {
            return Err(Error::GridMisalignment(
                "reference grid has no finite origin".into(),
            ));
        }
        let cell = transform.pixel_width;
        if !(cell.is_finite() && cell > 0.0) {
            return Err(Error::GridMisalignment(format!(
                "reference grid cell size must be positive, got {}",
                cell
            )));
        }
        if !transform.is_north_up() {
            return Err(Error::GridMisalignment(
                "reference grid must be north-up without rotation".into(),
            ));
        }
        if ((-transform.pixel_height) - cell).abs() > cell * ALIGN_TOLERANCE {
            return Err(Error::GridMisalignment(format!(
                "reference grid cells must be square, got {} x {}",
                cell, -transform.pixel_height
            )));
        }
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        Ok(Self {
            transform,
            rows,
            cols,
            crs,
        })
    }

    /// Take origin, cell size, extent and CRS from an existing raster.
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Result<Self> {
        Self::new(
            *raster.transform(),
            raster.rows(),
            raster.cols(),
            raster.crs().cloned(),
        )
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Same origin and extent, resampled to `cell_size`.
    ///
    /// `cell_size` must be a whole multiple of the reference cell size so
    /// that every output cell boundary is also a reference cell boundary.
    /// The extent is rounded outward to whole output cells.
    pub fn with_cell_size(&self, cell_size: f64) -> Result<Self> {
        let reference = self.cell_size();
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::GridMisalignment(format!(
                "output cell size must be positive, got {}",
                cell_size
            )));
        }

        let ratio = cell_size / reference;
        let whole = ratio.round();
        if whole < 1.0 || (ratio - whole).abs() > ratio * ALIGN_TOLERANCE {
            return Err(Error::GridMisalignment(format!(
                "cell size {} is not a whole multiple of the reference cell size {}",
                cell_size, reference
            )));
        }
        if whole == 1.0 {
            return Ok(self.clone());
        }

        let factor = whole as usize;
        let transform = GeoTransform::new(
            self.transform.origin_x,
            self.transform.origin_y,
            reference * whole,
            -reference * whole,
        );

        Self::new(
            transform,
            self.rows.div_ceil(factor),
            self.cols.div_ceil(factor),
            self.crs.clone(),
        )
    }

    /// Sub-grid covering `bounds` (min_x, min_y, max_x, max_y), snapped
    /// outward to whole cells and clipped to this grid.
    ///
    /// Returns `None` when the bounds do not overlap the grid.
    pub fn window(&self, bounds: (f64, f64, f64, f64)) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let cell = self.cell_size();
        let ox = self.transform.origin_x;
        let oy = self.transform.origin_y;

        let col0 = ((min_x - ox) / cell).floor().max(0.0);
        let col1 = ((max_x - ox) / cell).ceil().min(self.cols as f64);
        let row0 = ((oy - max_y) / cell).floor().max(0.0);
        let row1 = ((oy - min_y) / cell).ceil().min(self.rows as f64);

        if !(col1 > col0 && row1 > row0) {
            return None;
        }

        let (col0, col1, row0, row1) = (col0 as usize, col1 as usize, row0 as usize, row1 as usize);
        let transform = GeoTransform::new(ox + col0 as f64 * cell, oy - row0 as f64 * cell, cell, -cell);

        Some(Self {
            transform,
            rows: row1 - row0,
            cols: col1 - col0,
            crs: self.crs.clone(),
        })
    }

    /// Empty (all zero) raster carrying this grid's georeferencing
    pub fn blank<T: RasterElement>(&self) -> Raster<T> {
        let mut raster = Raster::new(self.rows, self.cols);
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster
    }
}

/// Boolean extent-of-interest mask.
///
/// Valid, non-zero cells are inside; zero, no-data and anything off the
/// mask raster are outside.
#[derive(Debug, Clone)]
pub struct ExtentMask {
    cells: Raster<u8>,
    bounds: Option<(f64, f64, f64, f64)>,
}

impl ExtentMask {
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let (rows, cols) = (raster.rows(), raster.cols());
        let mut cells: Raster<u8> = Raster::new(rows, cols);
        cells.set_transform(*raster.transform());
        cells.set_crs(raster.crs().cloned());

        let (mut r0, mut r1, mut c0, mut c1) = (usize::MAX, 0, usize::MAX, 0);
        for ((row, col), &value) in raster.data().indexed_iter() {
            if raster.is_nodata(value) || value.is_zero() {
                continue;
            }
            cells.data_mut()[(row, col)] = 1;
            r0 = r0.min(row);
            r1 = r1.max(row + 1);
            c0 = c0.min(col);
            c1 = c1.max(col + 1);
        }

        let bounds = if r0 == usize::MAX {
            None
        } else {
            let gt = raster.transform();
            let (x0, y0) = gt.pixel_to_geo_corner(c0, r0);
            let (x1, y1) = gt.pixel_to_geo_corner(c1, r1);
            Some((x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
        };

        Self { cells, bounds }
    }

    /// Bounds of the inside cells, `None` if the mask is all outside
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.bounds
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.cells.crs()
    }

    /// Whether map point (x, y) is inside the extent
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.cells.value_at(x, y) == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> ReferenceGrid {
        ReferenceGrid::new(GeoTransform::new(0.0, 0.0, 10.0, -10.0), 10, 10, None).unwrap()
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        let err = ReferenceGrid::new(GeoTransform::new(0.0, 0.0, 0.0, -10.0), 10, 10, None)
            .unwrap_err();
        assert!(matches!(err, Error::GridMisalignment(_)));
    }

    #[test]
    fn test_rejects_rotation() {
        let mut gt = GeoTransform::new(0.0, 0.0, 10.0, -10.0);
        gt.row_rotation = 0.5;
        assert!(ReferenceGrid::new(gt, 10, 10, None).is_err());
    }

    #[test]
    fn test_coarser_cell_size_keeps_origin() {
        let coarse = grid().with_cell_size(30.0).unwrap();
        assert_eq!(coarse.shape(), (4, 4));
        assert_relative_eq!(coarse.transform().origin_x, 0.0);
        assert_relative_eq!(coarse.cell_size(), 30.0);
    }

    #[test]
    fn test_misaligned_cell_size() {
        let err = grid().with_cell_size(15.0).unwrap_err();
        assert!(matches!(err, Error::GridMisalignment(_)));
    }

    #[test]
    fn test_window_snaps_outward() {
        let win = grid().window((12.0, -38.0, 31.0, -21.0)).unwrap();
        assert_relative_eq!(win.transform().origin_x, 10.0);
        assert_relative_eq!(win.transform().origin_y, -20.0);
        assert_eq!(win.shape(), (2, 3));
    }

    #[test]
    fn test_window_outside() {
        assert!(grid().window((500.0, 500.0, 600.0, 600.0)).is_none());
    }

    #[test]
    fn test_extent_mask_bounds() {
        let mut raster: Raster<u8> = Raster::new(4, 4);
        raster.set_transform(GeoTransform::new(0.0, 0.0, 10.0, -10.0));
        raster.set(1, 1, 1).unwrap();
        raster.set(2, 2, 1).unwrap();

        let mask = ExtentMask::from_raster(&raster);
        assert_eq!(mask.bounds(), Some((10.0, -30.0, 30.0, -10.0)));
        assert!(mask.contains(15.0, -15.0));
        assert!(!mask.contains(25.0, -15.0));
        assert!(!mask.contains(-5.0, -15.0));
    }
}
