//! Buffer operations
//!
//! Round-capped, round-joined buffers built from convex pieces. Every line
//! segment is swept into a "capsule" (a rectangle with a half-disc on each
//! end); the buffer of a line is the union of its capsules, and the buffer
//! of a polygon is the polygon united with the capsules of its ring edges.
//! Arcs are inscribed regular polygons, so a buffer never reaches further
//! than the requested distance and grows monotonically with it.

use crate::vector::overlay::{to_multi_line_string, to_multi_polygon, union_all};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use riparia_core::vector::GeometryKind;
use riparia_core::{Error, Result};
use std::f64::consts::PI;

/// Buffer distance for a layer, in meters
#[derive(Debug, Clone, PartialEq)]
pub enum BufferSpec {
    /// One distance for every feature
    Fixed(f64),
    /// One distance per feature, in layer order
    PerFeature(Vec<f64>),
}

impl BufferSpec {
    /// Distance for the feature at `index`
    pub fn distance(&self, index: usize) -> Option<f64> {
        match self {
            BufferSpec::Fixed(d) => Some(*d),
            BufferSpec::PerFeature(ds) => ds.get(index).copied(),
        }
    }

    /// Check distances are finite and non-negative, and that a per-feature
    /// spec covers exactly `feature_count` features.
    pub fn check(&self, feature_count: usize) -> Result<()> {
        let distances: &[f64] = match self {
            BufferSpec::Fixed(d) => std::slice::from_ref(d),
            BufferSpec::PerFeature(ds) => {
                if ds.len() != feature_count {
                    return Err(Error::InvalidParameter {
                        name: "buffer_spec",
                        value: ds.len().to_string(),
                        reason: format!("expected one distance per feature ({})", feature_count),
                    });
                }
                ds
            }
        };

        match distances.iter().find(|d| !(d.is_finite() && **d >= 0.0)) {
            Some(d) => Err(Error::InvalidParameter {
                name: "buffer_distance",
                value: d.to_string(),
                reason: "must be finite and non-negative".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Parameters for buffering one geometry
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in layer units
    pub distance: f64,
    /// Vertices per full circle for caps and joins (default: 64)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 64,
        }
    }
}

/// Vertices along the arc from `start` to `start + sweep` radians,
/// both ends included.
fn arc(center: Coord<f64>, r: f64, start: f64, sweep: f64, steps: usize, out: &mut Vec<Coord<f64>>) {
    for k in 0..=steps {
        let angle = start + sweep * k as f64 / steps as f64;
        out.push(Coord {
            x: center.x + r * angle.cos(),
            y: center.y + r * angle.sin(),
        });
    }
}

/// Circle approximated by a regular polygon with `segments` vertices
pub fn circle(center: Coord<f64>, r: f64, segments: usize) -> Polygon<f64> {
    let n = segments.max(8);
    let mut coords = Vec::with_capacity(n + 1);
    arc(center, r, 0.0, 2.0 * PI * (n - 1) as f64 / n as f64, n - 1, &mut coords);
    // Close the ring
    coords.push(coords[0]);
    Polygon::new(LineString::from(coords), vec![])
}

/// Round-capped buffer of the segment `a`–`b`.
///
/// The straight sides sit exactly `r` from the segment; each cap is a
/// half-circle with `segments / 2` edges.
pub fn capsule(a: Coord<f64>, b: Coord<f64>, r: f64, segments: usize) -> Polygon<f64> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx == 0.0 && dy == 0.0 {
        return circle(a, r, segments);
    }

    let half = (segments.max(8) / 2).max(4);
    let theta = dy.atan2(dx);
    let mut coords = Vec::with_capacity(2 * half + 3);
    arc(b, r, theta - PI / 2.0, PI, half, &mut coords);
    arc(a, r, theta + PI / 2.0, PI, half, &mut coords);
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

fn ring_capsules(ring: &LineString<f64>, r: f64, segments: usize) -> impl Iterator<Item = MultiPolygon<f64>> + '_ {
    ring.0
        .windows(2)
        .map(move |w| MultiPolygon::new(vec![capsule(w[0], w[1], r, segments)]))
}

/// Buffer a polygon or line geometry by `params.distance` layer units.
///
/// A polygon at distance 0 is returned unchanged; a line at distance 0
/// has no area and yields an empty result.
pub fn buffer_geometry(geom: &Geometry<f64>, params: &BufferParams) -> MultiPolygon<f64> {
    let r = params.distance;
    match GeometryKind::of(geom) {
        Some(GeometryKind::Polygon) => {
            let mp = to_multi_polygon(geom);
            if r <= 0.0 {
                return mp;
            }
            let mut parts: Vec<MultiPolygon<f64>> = Vec::new();
            for polygon in &mp.0 {
                parts.extend(ring_capsules(polygon.exterior(), r, params.segments));
                for hole in polygon.interiors() {
                    parts.extend(ring_capsules(hole, r, params.segments));
                }
            }
            parts.push(mp);
            union_all(parts)
        }
        Some(GeometryKind::Line) => {
            if r <= 0.0 {
                return MultiPolygon::new(vec![]);
            }
            let mut parts: Vec<MultiPolygon<f64>> = Vec::new();
            for ls in to_multi_line_string(geom).0 {
                match ls.0.len() {
                    0 => {}
                    1 => parts.push(MultiPolygon::new(vec![circle(ls.0[0], r, params.segments)])),
                    _ => parts.extend(ring_capsules(&ls, r, params.segments)),
                }
            }
            union_all(parts)
        }
        None => MultiPolygon::new(vec![]),
    }
}
