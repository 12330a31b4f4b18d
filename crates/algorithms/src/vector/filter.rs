//! Feature selection by predicate
//!
//! A filter never alters the features it keeps: geometry, attributes and
//! identity pass through unchanged.

use crate::maybe_rayon::*;
use crate::vector::measurements::area;
use riparia_core::vector::{Feature, VectorLayer};
use riparia_core::{Result, CRS};

/// Square meters in one international acre
pub const SQUARE_METERS_PER_ACRE: f64 = 4046.856_422_4;

/// A test applied to each feature of a layer
pub trait FeaturePredicate: Sync {
    /// Whether `feature`, whose coordinates are in `crs`, is kept
    fn matches(&self, feature: &Feature, crs: &CRS) -> Result<bool>;

    /// Keep features matching both predicates
    fn and<P: FeaturePredicate>(self, other: P) -> Both<Self, P>
    where
        Self: Sized,
    {
        Both(self, other)
    }
}

impl<F> FeaturePredicate for F
where
    F: Fn(&Feature) -> bool + Sync,
{
    fn matches(&self, feature: &Feature, _crs: &CRS) -> Result<bool> {
        Ok(self(feature))
    }
}

/// Conjunction of two predicates, see [`FeaturePredicate::and`]
#[derive(Debug, Clone)]
pub struct Both<A, B>(pub A, pub B);

impl<A: FeaturePredicate, B: FeaturePredicate> FeaturePredicate for Both<A, B> {
    fn matches(&self, feature: &Feature, crs: &CRS) -> Result<bool> {
        Ok(self.0.matches(feature, crs)? && self.1.matches(feature, crs)?)
    }
}

/// Polygon area at or above a threshold.
///
/// Area is measured in the layer's planar units and converted to square
/// meters; a geographic CRS is a `UnitMismatch`, never a comparison in
/// square degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaAtLeast {
    pub min_area_m2: f64,
}

impl AreaAtLeast {
    pub fn square_meters(min_area_m2: f64) -> Self {
        Self { min_area_m2 }
    }

    pub fn acres(min_acres: f64) -> Self {
        Self {
            min_area_m2: min_acres * SQUARE_METERS_PER_ACRE,
        }
    }
}

impl FeaturePredicate for AreaAtLeast {
    fn matches(&self, feature: &Feature, crs: &CRS) -> Result<bool> {
        let mpu = crs.meters_per_unit()?;
        Ok(area(&feature.geometry) * mpu * mpu >= self.min_area_m2)
    }
}

/// Integer attribute value in a set of codes; features without the
/// attribute do not match.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeIn {
    pub field: String,
    pub codes: Vec<i64>,
}

impl AttributeIn {
    pub fn new(field: impl Into<String>, codes: impl Into<Vec<i64>>) -> Self {
        Self {
            field: field.into(),
            codes: codes.into(),
        }
    }
}

impl FeaturePredicate for AttributeIn {
    fn matches(&self, feature: &Feature, _crs: &CRS) -> Result<bool> {
        Ok(feature
            .get_property(&self.field)
            .and_then(|v| v.as_i64())
            .is_some_and(|code| self.codes.contains(&code)))
    }
}

/// Features of `layer` matching `predicate`, as a new layer named `name`.
pub fn filter_layer<P: FeaturePredicate + ?Sized>(
    layer: &VectorLayer,
    predicate: &P,
    name: &str,
) -> Result<VectorLayer> {
    let kept = layer
        .features()
        .par_iter()
        .map(|f| Ok(predicate.matches(f, layer.crs())?.then(|| f.clone())))
        .collect::<Result<Vec<Option<Feature>>>>()?;

    layer.derive(name, layer.kind(), kept.into_iter().flatten().collect())
}
