//! Vector data structures
//!
//! A [`VectorLayer`] is an immutable collection of [`Feature`]s that share a
//! geometry kind and a CRS. Operations never mutate a layer; they build a
//! new one.

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value; numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Null | AttributeValue::Bool(_) => None,
        }
    }

    /// Integer view of the value; floats with no fractional part convert.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            AttributeValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Whether a layer holds areas or lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Polygon,
    Line,
}

impl GeometryKind {
    /// Kind of a geometry, `None` for points and collections.
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                Some(GeometryKind::Polygon)
            }
            Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
                Some(GeometryKind::Line)
            }
            _ => None,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKind::Polygon => write!(f, "polygon"),
            GeometryKind::Line => write!(f, "line"),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Geometry<f64>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Feature identity, used in error messages
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style id setter
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Same attributes and id, different geometry
    pub fn with_geometry(&self, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: self.properties.clone(),
            id: self.id.clone(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Immutable collection of features sharing a geometry kind and CRS
#[derive(Debug, Clone)]
pub struct VectorLayer {
    name: String,
    kind: GeometryKind,
    crs: CRS,
    features: Vec<Feature>,
}

impl VectorLayer {
    /// Create a layer, checking every feature against the layer kind.
    pub fn new(
        name: impl Into<String>,
        kind: GeometryKind,
        crs: CRS,
        features: Vec<Feature>,
    ) -> Result<Self> {
        let name = name.into();
        for feature in &features {
            match GeometryKind::of(&feature.geometry) {
                Some(k) if k == kind => {}
                Some(k) => {
                    return Err(Error::invalid_geometry(
                        feature.id(),
                        format!("{} geometry in {} layer `{}`", k, kind, name),
                    ))
                }
                None => {
                    return Err(Error::invalid_geometry(
                        feature.id(),
                        format!("unsupported geometry type in layer `{}`", name),
                    ))
                }
            }
        }

        Ok(Self {
            name,
            kind,
            crs,
            features,
        })
    }

    /// A layer with no features
    pub fn empty(name: impl Into<String>, kind: GeometryKind, crs: CRS) -> Self {
        Self {
            name: name.into(),
            kind,
            crs,
            features: Vec::new(),
        }
    }

    /// New layer with the same CRS, built from `features` of `kind`
    pub fn derive(&self, name: impl Into<String>, kind: GeometryKind, features: Vec<Feature>) -> Result<Self> {
        Self::new(name, kind, self.crs.clone(), features)
    }

    /// The same layer under another name
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Fail with [`Error::CrsMismatch`] unless `other` shares this layer's CRS
    pub fn ensure_same_crs(&self, other: &VectorLayer) -> Result<()> {
        if self.crs.is_equivalent(&other.crs) {
            Ok(())
        } else {
            Err(Error::CrsMismatch(
                format!("{} ({})", self.name, self.crs),
                format!("{} ({})", other.name, other.crs),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, polygon};

    fn square() -> Feature {
        Feature::new(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)])
    }

    #[test]
    fn test_layer_rejects_mixed_kinds() {
        let line = Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]).with_id("l1");
        let err = VectorLayer::new("water", GeometryKind::Polygon, CRS::conus_albers(), vec![square(), line])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { feature: Some(ref id), .. } if id == "l1"));
    }

    #[test]
    fn test_renamed_keeps_features() {
        let layer = VectorLayer::new("a", GeometryKind::Polygon, CRS::conus_albers(), vec![square()])
            .unwrap()
            .renamed("b");
        assert_eq!(layer.name(), "b");
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn test_crs_check() {
        let a = VectorLayer::empty("a", GeometryKind::Polygon, CRS::conus_albers());
        let b = VectorLayer::empty("b", GeometryKind::Polygon, CRS::from_epsg(26918));
        assert!(a.ensure_same_crs(&a).is_ok());
        assert!(matches!(a.ensure_same_crs(&b), Err(Error::CrsMismatch(..))));
    }

    #[test]
    fn test_attribute_numeric_views() {
        assert_eq!(AttributeValue::Int(1300).as_i64(), Some(1300));
        assert_eq!(AttributeValue::Float(1210.0).as_i64(), Some(1210));
        assert_eq!(AttributeValue::String(" 20.5 ".into()).as_f64(), Some(20.5));
        assert_eq!(AttributeValue::Null.as_f64(), None);
    }
}
