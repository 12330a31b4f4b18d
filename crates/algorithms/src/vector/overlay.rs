//! Overlay operations: union, dissolve and erase
//!
//! Boolean operations run through `geo`'s `BooleanOps`. Large unions are
//! reduced pairwise in a balanced tree so that each level can run in
//! parallel and no single polygon grows by thousands of tiny steps.

use crate::maybe_rayon::*;
use crate::vector::measurements::line_string_length;
use crate::vector::spatial::{multi_polygon_bbox, polygon_bbox, BoundingBox};
use geo::{Area, BooleanOps, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};

/// Polygonal part of a geometry as a `MultiPolygon` (empty for lines).
pub fn to_multi_polygon(geom: &Geometry<f64>) -> MultiPolygon<f64> {
    match geom {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
        _ => MultiPolygon::new(vec![]),
    }
}

/// Lineal part of a geometry as a `MultiLineString` (empty for polygons).
pub fn to_multi_line_string(geom: &Geometry<f64>) -> MultiLineString<f64> {
    match geom {
        Geometry::LineString(ls) => MultiLineString::new(vec![ls.clone()]),
        Geometry::MultiLineString(mls) => mls.clone(),
        Geometry::Line(l) => MultiLineString::new(vec![LineString::from(vec![l.start, l.end])]),
        _ => MultiLineString::new(vec![]),
    }
}

/// Collapse a polygon collection back into a feature geometry.
///
/// `None` when nothing is left, a bare `Polygon` for a single part.
pub fn polygonal_geometry(mut mp: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match mp.0.len() {
        0 => None,
        1 => mp.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(mp)),
    }
}

/// Collapse a line collection back into a feature geometry.
pub fn lineal_geometry(mut mls: MultiLineString<f64>) -> Option<Geometry<f64>> {
    match mls.0.len() {
        0 => None,
        1 => mls.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(mls)),
    }
}

/// Union of all inputs as non-overlapping polygons.
///
/// Inputs are ordered by bounding-box center before the tree reduction so
/// that neighbours meet early and intermediate results stay small.
pub fn union_all(parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut keyed: Vec<((f64, f64), MultiPolygon<f64>)> = parts
        .into_iter()
        .filter_map(|mp| multi_polygon_bbox(&mp).map(|bb| (bb.center(), mp)))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut level: Vec<MultiPolygon<f64>> = keyed.into_iter().map(|(_, mp)| mp).collect();
    if level.is_empty() {
        return MultiPolygon::new(vec![]);
    }

    while level.len() > 1 {
        let mut pairs = Vec::with_capacity(level.len() / 2 + 1);
        let mut it = level.into_iter();
        while let Some(a) = it.next() {
            pairs.push((a, it.next()));
        }

        level = pairs
            .into_par_iter()
            .map(|(a, b)| match b {
                Some(b) => a.union(&b),
                None => a,
            })
            .collect();
    }

    // A single input still goes through one union so overlapping parts
    // of a lone multipolygon are dissolved too.
    let single = level.pop().unwrap_or_else(|| MultiPolygon::new(vec![]));
    single.union(&MultiPolygon::new(vec![]))
}

/// A dissolved polygon set, split into components with bounding boxes, that
/// other geometries are erased against.
#[derive(Debug, Clone)]
pub struct Eraser {
    components: Vec<(BoundingBox, Polygon<f64>)>,
}

impl Eraser {
    /// Dissolve `parts` into an eraser
    pub fn new(parts: Vec<MultiPolygon<f64>>) -> Self {
        let components = union_all(parts)
            .0
            .into_iter()
            .filter_map(|p| polygon_bbox(&p).map(|bb| (bb, p)))
            .collect();
        Self { components }
    }

    /// Number of dissolved components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    fn candidates(&self, bbox: &BoundingBox) -> MultiPolygon<f64> {
        MultiPolygon::new(
            self.components
                .iter()
                .filter(|(bb, _)| bb.intersects(bbox))
                .map(|(_, p)| p.clone())
                .collect(),
        )
    }

    /// `mp` minus the eraser; parts smaller than `min_area` are dropped.
    ///
    /// Returns `mp` untouched when no eraser component comes near it.
    pub fn erase_polygons(&self, mp: &MultiPolygon<f64>, min_area: f64) -> MultiPolygon<f64> {
        let Some(bbox) = multi_polygon_bbox(mp) else {
            return MultiPolygon::new(vec![]);
        };
        let nearby = self.candidates(&bbox);
        if nearby.0.is_empty() {
            return mp.clone();
        }

        let mut rest = mp.difference(&nearby);
        rest.0.retain(|p| p.unsigned_area() >= min_area);
        rest
    }

    /// Parts of `mls` outside the eraser; parts no longer than `min_length`
    /// are dropped.
    pub fn erase_lines(&self, mls: &MultiLineString<f64>, min_length: f64) -> MultiLineString<f64> {
        let bbox = mls
            .0
            .iter()
            .flat_map(|ls| ls.0.iter())
            .map(|c| BoundingBox::new(c.x, c.y, c.x, c.y))
            .reduce(|a, b| a.merge(&b));
        let Some(bbox) = bbox else {
            return MultiLineString::new(vec![]);
        };
        let nearby = self.candidates(&bbox);
        if nearby.0.is_empty() {
            return mls.clone();
        }

        let mut rest = nearby.clip(mls, true);
        rest.0.retain(|ls| line_string_length(ls) > min_length);
        rest
    }
}
