//! Vector geometry primitives
//!
//! Geometric operations on single geometries and feature layers:
//! - Validate: detect and repair invalid polygons and lines
//! - Buffer: round-capped, round-joined buffers of lines and polygons
//! - Overlay: union, dissolve and erase
//! - Filter: keep features matching a predicate
//! - Area / Length: geometric measurements
//! - Bounding box: axis-aligned envelope

mod buffer;
mod filter;
mod measurements;
mod overlay;
mod spatial;
mod validate;

pub use buffer::{buffer_geometry, capsule, circle, BufferParams, BufferSpec};
pub use filter::{filter_layer, AreaAtLeast, AttributeIn, Both, FeaturePredicate, SQUARE_METERS_PER_ACRE};
pub use measurements::{area, length, line_string_length};
pub use overlay::{
    lineal_geometry, polygonal_geometry, to_multi_line_string, to_multi_polygon, union_all, Eraser,
};
pub use spatial::{multi_polygon_bbox, polygon_bbox, BoundingBox};
pub use validate::{
    geometry_problem, repair_geometry, validate_feature, validate_layer, InvalidGeometryPolicy,
};
