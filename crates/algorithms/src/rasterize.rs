//! Grid-aligned polygon rasterization
//!
//! A cell is burned (value 1) iff its center lies inside the polygons.
//! The layer is dissolved first, so overlapping features burn like their
//! union. Inside-ness is then even-odd over the dissolved rings; an edge
//! counts as crossing a scanline when exactly one endpoint lies strictly
//! above it, so a center on a boundary is claimed exactly once.
//!
//! Edges are bucketed by the rows whose center line they cross, then rows
//! are filled in parallel.

use crate::maybe_rayon::*;
use crate::vector::{to_multi_polygon, union_all};
use geo::{Coord, LineString, MultiPolygon};
use ndarray::Array2;
use riparia_core::raster::{ExtentMask, Raster, ReferenceGrid};
use riparia_core::vector::{GeometryKind, VectorLayer};
use riparia_core::{Error, Result};
use tracing::debug;

/// Burn a polygon layer onto `grid`.
///
/// With an extent mask the output covers only the grid window around the
/// mask's inside cells, and cells whose center falls outside the mask are 0.
/// Values inside the extent are the same as without a mask.
pub fn rasterize_layer(layer: &VectorLayer, grid: &ReferenceGrid, extent: Option<&ExtentMask>) -> Result<Raster<u8>> {
    if layer.kind() != GeometryKind::Polygon {
        return Err(Error::InvalidParameter {
            name: "layer",
            value: layer.name().to_string(),
            reason: "only polygon layers can be rasterized".into(),
        });
    }
    if let Some(grid_crs) = grid.crs() {
        if !grid_crs.is_equivalent(layer.crs()) {
            return Err(Error::CrsMismatch(
                format!("{} ({})", layer.name(), layer.crs()),
                format!("reference grid ({})", grid_crs),
            ));
        }
    }

    let window = match extent {
        Some(mask) => {
            if let (Some(mask_crs), Some(grid_crs)) = (mask.crs(), grid.crs()) {
                if !mask_crs.is_equivalent(grid_crs) {
                    return Err(Error::CrsMismatch(
                        format!("extent mask ({})", mask_crs),
                        format!("reference grid ({})", grid_crs),
                    ));
                }
            }
            mask.bounds()
                .and_then(|b| grid.window(b))
                .ok_or_else(|| Error::GridMisalignment("extent mask does not overlap the reference grid".into()))?
        }
        None => grid.clone(),
    };

    let polygons = union_all(layer.iter().map(|f| to_multi_polygon(&f.geometry)).collect());
    debug!(
        "rasterizing {} polygons onto {}x{} cells",
        polygons.0.len(),
        window.shape().0,
        window.shape().1
    );

    burn(&polygons, &window, extent)
}

/// Edges grouped by the grid rows whose center line they cross
fn bucket_edges(polygons: &MultiPolygon<f64>, grid: &ReferenceGrid) -> (Vec<(Coord<f64>, Coord<f64>)>, Vec<Vec<usize>>) {
    let (rows, _) = grid.shape();
    let cell = grid.cell_size();
    let oy = grid.transform().origin_y;

    let mut edges = Vec::new();
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); rows];

    let rings = polygons
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()));

    for ring in rings {
        for (a, b) in ring_edges(ring) {
            if a.y == b.y {
                continue;
            }
            let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
            // Candidate rows, widened by one on each side; the exact
            // crossing test below decides.
            let first = ((oy - hi) / cell - 0.5).floor() as i64;
            let last = ((oy - lo) / cell - 0.5).floor() as i64 + 1;
            let first = first.max(0) as usize;
            let last = last.min(rows as i64 - 1);
            if last < first as i64 {
                continue;
            }

            let index = edges.len();
            edges.push((a, b));
            for row in first..=last as usize {
                let y = row_center(oy, cell, row);
                if (a.y > y) != (b.y > y) {
                    buckets[row].push(index);
                }
            }
        }
    }

    (edges, buckets)
}

fn ring_edges(ring: &LineString<f64>) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    ring.0.windows(2).map(|w| (w[0], w[1]))
}

fn row_center(origin_y: f64, cell: f64, row: usize) -> f64 {
    origin_y - (row as f64 + 0.5) * cell
}

fn burn(polygons: &MultiPolygon<f64>, grid: &ReferenceGrid, extent: Option<&ExtentMask>) -> Result<Raster<u8>> {
    let (rows, cols) = grid.shape();
    let cell = grid.cell_size();
    let ox = grid.transform().origin_x;
    let oy = grid.transform().origin_y;

    let (edges, buckets) = bucket_edges(polygons, grid);

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            let y = row_center(oy, cell, row);

            let mut xs: Vec<f64> = buckets[row]
                .iter()
                .map(|&i| {
                    let (a, b) = edges[i];
                    a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y)
                })
                .collect();
            xs.sort_by(f64::total_cmp);

            // Centers x_c = ox + (c + 0.5) * cell with xa <= x_c < xb
            for span in xs.chunks_exact(2) {
                let start = ((span[0] - ox) / cell - 0.5).ceil().max(0.0);
                let end = ((span[1] - ox) / cell - 0.5).ceil().min(cols as f64);
                if end > start {
                    row_data[start as usize..end as usize].fill(1);
                }
            }

            if let Some(mask) = extent {
                for (col, value) in row_data.iter_mut().enumerate() {
                    if *value != 0 && !mask.contains(ox + (col as f64 + 0.5) * cell, y) {
                        *value = 0;
                    }
                }
            }

            row_data
        })
        .collect();

    let mut output = grid.blank::<u8>();
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
