//! Geometry validation and repair
//!
//! Every geometry entering buffer, erase or merge passes through here
//! first. Invalid input is either repaired (with a warning) or rejected,
//! depending on [`InvalidGeometryPolicy`]; it is never passed through.

use crate::maybe_rayon::*;
use crate::vector::overlay::{lineal_geometry, polygonal_geometry, to_multi_line_string, to_multi_polygon, union_all};
use crate::vector::spatial::polygon_bbox;
use geo::{Area, Coord, CoordsIter, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use riparia_core::vector::{Feature, GeometryKind, VectorLayer};
use riparia_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with a geometry that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidGeometryPolicy {
    /// Rebuild the geometry (polygon parts are re-noded and dissolved
    /// through a union, lines lose repeated vertices) and continue with a
    /// warning
    #[default]
    Repair,
    /// Fail the run with `InvalidGeometry`
    Reject,
}

/// Describe what is wrong with a geometry, `None` if it is valid.
pub fn geometry_problem(geom: &Geometry<f64>) -> Option<String> {
    if geom.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Some("non-finite coordinate".into());
    }

    match GeometryKind::of(geom) {
        Some(GeometryKind::Line) => line_problem(&to_multi_line_string(geom)),
        Some(GeometryKind::Polygon) => polygon_problem(&to_multi_polygon(geom)),
        None => Some("unsupported geometry type".into()),
    }
}

fn line_problem(mls: &MultiLineString<f64>) -> Option<String> {
    if mls.0.is_empty() {
        return Some("empty line".into());
    }
    for ls in &mls.0 {
        if distinct_vertices(ls) < 2 {
            return Some("line with fewer than two distinct vertices".into());
        }
        if ls.0.windows(2).any(|w| w[0] == w[1]) {
            return Some("repeated consecutive vertex".into());
        }
    }
    None
}

fn distinct_vertices(ls: &LineString<f64>) -> usize {
    let mut n = usize::from(!ls.0.is_empty());
    for w in ls.0.windows(2) {
        if w[0] != w[1] {
            n += 1;
        }
    }
    n
}

fn polygon_problem(mp: &MultiPolygon<f64>) -> Option<String> {
    if mp.0.is_empty() {
        return Some("empty polygon".into());
    }

    let mut rings: Vec<&LineString<f64>> = Vec::new();
    for polygon in &mp.0 {
        rings.push(polygon.exterior());
        rings.extend(polygon.interiors());
    }

    for ring in &rings {
        if distinct_vertices(ring) < 4 {
            return Some("ring with fewer than three distinct vertices".into());
        }
        if ring_area(ring).abs() == 0.0 {
            return Some("zero-area ring".into());
        }
    }

    if rings_self_intersect(&rings) {
        return Some("self-intersecting rings".into());
    }
    if parts_overlap(&mp.0) {
        return Some("overlapping polygon parts".into());
    }
    None
}

/// True when some part has a vertex strictly inside another part.
///
/// Only meaningful once ring crossings are ruled out: without crossings a
/// part is either inside another one or disjoint from its interior.
fn parts_overlap(parts: &[Polygon<f64>]) -> bool {
    if parts.len() < 2 {
        return false;
    }
    let boxes: Vec<_> = parts.iter().map(polygon_bbox).collect();

    for (i, part) in parts.iter().enumerate() {
        for (j, other) in parts.iter().enumerate() {
            if i == j {
                continue;
            }
            let near = match (&boxes[i], &boxes[j]) {
                (Some(a), Some(b)) => a.intersects(b),
                _ => false,
            };
            if near && part.exterior().0.iter().any(|&p| strictly_inside(p, other)) {
                return true;
            }
        }
    }
    false
}

/// Inside the exterior and outside every hole, boundaries excluded
fn strictly_inside(p: Coord<f64>, polygon: &Polygon<f64>) -> bool {
    point_in_ring(p, polygon.exterior()) == Some(true)
        && polygon
            .interiors()
            .iter()
            .all(|hole| point_in_ring(p, hole) == Some(false))
}

/// Even-odd point-in-ring test, `None` on the boundary
fn point_in_ring(p: Coord<f64>, ring: &LineString<f64>) -> Option<bool> {
    let mut inside = false;
    for w in ring.0.windows(2) {
        let (a, b) = (w[0], w[1]);
        if orient(a, b, p) == 0.0
            && p.x >= a.x.min(b.x)
            && p.x <= a.x.max(b.x)
            && p.y >= a.y.min(b.y)
            && p.y <= a.y.max(b.y)
        {
            return None;
        }
        if (a.y > p.y) != (b.y > p.y) && p.x < a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y) {
            inside = !inside;
        }
    }
    Some(inside)
}

/// Signed shoelace area of a closed ring
fn ring_area(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>()
        / 2.0
}

fn orient(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

struct Segment {
    a: Coord<f64>,
    b: Coord<f64>,
    ring: usize,
    index: usize,
    ring_len: usize,
    min_x: f64,
    max_x: f64,
}

impl Segment {
    fn adjacent(&self, other: &Segment) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let d = self.index.abs_diff(other.index);
        d == 1 || d + 1 == self.ring_len
    }
}

/// Proper crossings or collinear overlaps between any two ring segments.
///
/// Segments are swept in order of their minimum x; a pair is only tested
/// when their x ranges overlap. Rings touching at a single vertex are
/// accepted.
fn rings_self_intersect(rings: &[&LineString<f64>]) -> bool {
    let mut segments: Vec<Segment> = Vec::new();
    for (ring_id, ring) in rings.iter().enumerate() {
        let ring_len = ring.0.len().saturating_sub(1);
        for (index, w) in ring.0.windows(2).enumerate() {
            if w[0] == w[1] {
                continue;
            }
            segments.push(Segment {
                a: w[0],
                b: w[1],
                ring: ring_id,
                index,
                ring_len,
                min_x: w[0].x.min(w[1].x),
                max_x: w[0].x.max(w[1].x),
            });
        }
    }
    segments.sort_by(|p, q| p.min_x.total_cmp(&q.min_x));

    for (i, s) in segments.iter().enumerate() {
        for t in &segments[i + 1..] {
            if t.min_x > s.max_x {
                break;
            }
            if s.adjacent(t) {
                continue;
            }
            if segments_conflict(s, t) {
                return true;
            }
        }
    }
    false
}

fn segments_conflict(s: &Segment, t: &Segment) -> bool {
    if s.a.y.max(s.b.y) < t.a.y.min(t.b.y) || t.a.y.max(t.b.y) < s.a.y.min(s.b.y) {
        return false;
    }

    let o1 = orient(s.a, s.b, t.a);
    let o2 = orient(s.a, s.b, t.b);
    let o3 = orient(t.a, t.b, s.a);
    let o4 = orient(t.a, t.b, s.b);

    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }

    if o1 == 0.0 && o2 == 0.0 {
        // Collinear: overlap of positive length along the dominant axis
        let (s0, s1, t0, t1) = if (s.b.x - s.a.x).abs() >= (s.b.y - s.a.y).abs() {
            (s.a.x.min(s.b.x), s.a.x.max(s.b.x), t.a.x.min(t.b.x), t.a.x.max(t.b.x))
        } else {
            (s.a.y.min(s.b.y), s.a.y.max(s.b.y), t.a.y.min(t.b.y), t.a.y.max(t.b.y))
        };
        return s1.min(t1) > s0.max(t0);
    }
    false
}

/// Attempt to rebuild an invalid geometry.
pub fn repair_geometry(geom: &Geometry<f64>) -> Option<Geometry<f64>> {
    if geom.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return None;
    }

    match GeometryKind::of(geom)? {
        GeometryKind::Polygon => {
            // Each part is re-noded on its own, then the parts are dissolved,
            // so a part nested in another is absorbed instead of becoming a hole
            let rebuilt = union_all(
                to_multi_polygon(geom)
                    .0
                    .into_iter()
                    .map(|p| MultiPolygon::new(vec![p]))
                    .collect(),
            );
            if rebuilt.unsigned_area() > 0.0 {
                polygonal_geometry(rebuilt)
            } else {
                None
            }
        }
        GeometryKind::Line => {
            let parts: Vec<LineString<f64>> = to_multi_line_string(geom)
                .0
                .into_iter()
                .map(|mut ls| {
                    ls.0.dedup();
                    ls
                })
                .filter(|ls| ls.0.len() >= 2)
                .collect();
            lineal_geometry(MultiLineString::new(parts))
        }
    }
}

/// Check one feature, repairing or rejecting it per `policy`.
pub fn validate_feature(feature: &Feature, policy: InvalidGeometryPolicy) -> Result<Feature> {
    let Some(problem) = geometry_problem(&feature.geometry) else {
        return Ok(feature.clone());
    };

    match policy {
        InvalidGeometryPolicy::Reject => Err(Error::invalid_geometry(feature.id(), problem)),
        InvalidGeometryPolicy::Repair => match repair_geometry(&feature.geometry) {
            Some(geometry) => {
                warn!(
                    "repaired feature {}: {}",
                    feature.id().unwrap_or("<unnamed>"),
                    problem
                );
                Ok(feature.with_geometry(geometry))
            }
            None => Err(Error::invalid_geometry(
                feature.id(),
                format!("{} (not repairable)", problem),
            )),
        },
    }
}

/// Validate every feature of a layer.
pub fn validate_layer(layer: &VectorLayer, policy: InvalidGeometryPolicy) -> Result<VectorLayer> {
    let features = layer
        .features()
        .par_iter()
        .map(|f| validate_feature(f, policy))
        .collect::<Result<Vec<_>>>()?;

    layer.derive(layer.name(), layer.kind(), features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, polygon};

    fn bowtie() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
        ])
    }

    #[test]
    fn test_valid_square() {
        let sq = Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]);
        assert_eq!(geometry_problem(&sq), None);
    }

    #[test]
    fn test_bowtie_detected() {
        assert!(geometry_problem(&bowtie()).unwrap().contains("self-intersecting"));
    }

    #[test]
    fn test_bowtie_repaired() {
        let repaired = repair_geometry(&bowtie()).unwrap();
        assert_eq!(geometry_problem(&repaired), None);
        assert!(repaired.unsigned_area() > 0.0);
    }

    fn nested_parts() -> Feature {
        Feature::new(MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)],
            polygon![(x: 40.0, y: 40.0), (x: 60.0, y: 40.0), (x: 60.0, y: 60.0), (x: 40.0, y: 60.0)],
        ]))
        .with_id("shore:7")
    }

    #[test]
    fn test_nested_parts_detected() {
        let problem = geometry_problem(&nested_parts().geometry).unwrap();
        assert!(problem.contains("overlapping polygon parts"), "{problem}");

        let err = validate_feature(&nested_parts(), InvalidGeometryPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { feature: Some(ref id), .. } if id == "shore:7"));
    }

    #[test]
    fn test_nested_parts_repaired_as_union() {
        let repaired = validate_feature(&nested_parts(), InvalidGeometryPolicy::Repair).unwrap();
        assert_relative_eq!(repaired.geometry.unsigned_area(), 10_000.0, epsilon = 1e-3);
        assert_eq!(geometry_problem(&repaired.geometry), None);
    }

    #[test]
    fn test_island_in_hole_is_valid() {
        let lake = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)],
            interiors: [[(x: 20.0, y: 20.0), (x: 80.0, y: 20.0), (x: 80.0, y: 80.0), (x: 20.0, y: 80.0)]]
        );
        let island = polygon![(x: 40.0, y: 40.0), (x: 60.0, y: 40.0), (x: 60.0, y: 60.0), (x: 40.0, y: 60.0)];
        let separate = polygon![(x: 200.0, y: 0.0), (x: 210.0, y: 0.0), (x: 210.0, y: 10.0)];

        let mp = Geometry::MultiPolygon(MultiPolygon::new(vec![lake, island, separate]));
        assert_eq!(geometry_problem(&mp), None);
    }

    #[test]
    fn test_zero_area_polygon_rejected() {
        let flat = Feature::new(polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 10.0, y: 0.0)]).with_id("w:3");

        let err = validate_feature(&flat, InvalidGeometryPolicy::Repair).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { feature: Some(ref id), .. } if id == "w:3"));

        let err = validate_feature(&flat, InvalidGeometryPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { .. }));
    }

    #[test]
    fn test_hole_touching_shell_at_vertex_is_valid() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(0.0, 0.0), (5.0, 2.0), (2.0, 5.0), (0.0, 0.0)])],
        );
        assert_eq!(geometry_problem(&Geometry::Polygon(poly)), None);
    }

    #[test]
    fn test_line_with_repeated_vertex() {
        let line = Feature::new(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 5.0, y: 0.0)]);

        assert!(validate_feature(&line, InvalidGeometryPolicy::Reject).is_err());
        let repaired = validate_feature(&line, InvalidGeometryPolicy::Repair).unwrap();
        match repaired.geometry {
            Geometry::LineString(ls) => assert_eq!(ls.0.len(), 2),
            other => panic!("expected a line string, got {:?}", other),
        }
    }

    #[test]
    fn test_single_point_line_not_repairable() {
        let line = Feature::new(line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)]);
        assert!(validate_feature(&line, InvalidGeometryPolicy::Repair).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let line = Feature::new(line_string![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0)]);
        assert!(validate_feature(&line, InvalidGeometryPolicy::Repair).is_err());
    }
}
