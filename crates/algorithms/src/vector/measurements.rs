//! Geometric measurements: area, length

use geo::{Area as GeoArea, Geometry, LineString};

/// Calculate the area of a geometry.
///
/// Returns unsigned area in CRS units squared. Callers comparing against
/// thresholds in square meters multiply by `meters_per_unit²` first.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        _ => 0.0,
    }
}

/// Euclidean length of a line string
pub fn line_string_length(ls: &LineString<f64>) -> f64 {
    ls.0
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

/// Calculate the length of a linear geometry.
///
/// Returns Euclidean length in CRS units.
pub fn length(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::LineString(ls) => line_string_length(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().map(line_string_length).sum(),
        Geometry::Line(l) => (l.end.x - l.start.x).hypot(l.end.y - l.start.y),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Line, MultiLineString, Polygon};

    #[test]
    fn test_area_square_with_hole() {
        let poly = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0),
            ])],
        );
        let a = area(&Geometry::Polygon(poly));
        assert!((a - 64.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_non_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(area(&line), 0.0);
    }

    #[test]
    fn test_length_multiline() {
        let mls = Geometry::MultiLineString(MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (3.0, 4.0)]),
            LineString::from(vec![(0.0, 0.0), (0.0, 5.0)]),
        ]));
        assert!((length(&mls) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_length_segment() {
        let line = Geometry::Line(Line::new(
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 6.0, y: 8.0 },
        ));
        assert!((length(&line) - 10.0).abs() < 1e-10);
    }
}
