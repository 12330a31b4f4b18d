//! GeoJSON reading/writing for vector layers
//!
//! Layers are `FeatureCollection`s. The CRS travels in the legacy `crs`
//! member (`{"type": "name", "properties": {"name": "EPSG:5070"}}`); when it
//! is absent the caller's working CRS applies. Nothing is reprojected: a
//! declared CRS that differs from the working CRS is an error.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, GeometryKind, VectorLayer};
use geojson::feature::Id;
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Read a GeoJSON file into a layer of `kind`.
pub fn read_vector_layer<P: AsRef<Path>>(
    path: P,
    name: &str,
    kind: GeometryKind,
    working_crs: &CRS,
) -> Result<VectorLayer> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_vector_layer(&text, name, kind, working_crs).map_err(|e| match e {
        Error::Other(reason) => Error::Format {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Parse GeoJSON text into a layer of `kind`.
///
/// Features with a null geometry are skipped with a warning. Points,
/// geometry collections and geometries of the other kind are rejected.
pub fn parse_vector_layer(
    text: &str,
    name: &str,
    kind: GeometryKind,
    working_crs: &CRS,
) -> Result<VectorLayer> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| Error::Other(format!("invalid GeoJSON: {}", e)))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(g) => FeatureCollection {
            bbox: None,
            features: vec![geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        },
    };

    let crs = match declared_crs(collection.foreign_members.as_ref())? {
        Some(declared) if !declared.is_equivalent(working_crs) => {
            return Err(Error::CrsMismatch(
                format!("{} ({})", name, declared),
                format!("working CRS ({})", working_crs),
            ))
        }
        _ => working_crs.clone(),
    };

    let mut features = Vec::with_capacity(collection.features.len());
    for (index, gj) in collection.features.into_iter().enumerate() {
        let id = match &gj.id {
            Some(Id::String(s)) => s.clone(),
            Some(Id::Number(n)) => n.to_string(),
            None => format!("{}:{}", name, index),
        };

        let Some(geometry) = gj.geometry else {
            warn!("{}: feature {} has no geometry, skipping", name, id);
            continue;
        };
        let geometry = geo_types::Geometry::<f64>::try_from(geometry)
            .map_err(|e| Error::invalid_geometry(Some(&id), e.to_string()))?;

        let properties = gj
            .properties
            .map(|props| {
                props
                    .into_iter()
                    .map(|(k, v)| (k, attribute_from_json(v)))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        features.push(Feature {
            geometry,
            properties,
            id: Some(id),
        });
    }

    VectorLayer::new(name, kind, crs, features)
}

/// Write a layer as a GeoJSON FeatureCollection.
pub fn write_vector_layer<P: AsRef<Path>>(layer: &VectorLayer, path: P) -> Result<()> {
    std::fs::write(path, vector_layer_to_string(layer)?)?;
    Ok(())
}

/// Serialize a layer as GeoJSON text.
pub fn vector_layer_to_string(layer: &VectorLayer) -> Result<String> {
    let features = layer
        .iter()
        .map(|feature| {
            let properties: JsonObject = feature
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect();

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
                id: feature.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = layer.crs().epsg().map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
            }),
        );
        members
    });

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };

    serde_json::to_string(&collection).map_err(|e| Error::Other(e.to_string()))
}

fn declared_crs(members: Option<&JsonObject>) -> Result<Option<CRS>> {
    let Some(crs) = members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };
    match crs.pointer("/properties/name").and_then(JsonValue::as_str) {
        Some(name) => CRS::parse(name).map(Some),
        None => Err(Error::Other(
            "`crs` member must be {\"type\": \"name\", \"properties\": {\"name\": ...}}".into(),
        )),
    }
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => JsonValue::from(*f),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const STREAMS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::5070"}},
        "features": [
            {"type": "Feature", "id": 17,
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [100, 0]]},
             "properties": {"channel_width": 20.0, "name": "Deer Creek"}},
            {"type": "Feature", "geometry": null, "properties": {}},
            {"type": "Feature",
             "geometry": {"type": "MultiLineString", "coordinates": [[[0, 10], [50, 10]]]},
             "properties": {"channel_width": 4}}
        ]
    }"#;

    #[test]
    fn test_parse_lines_with_crs_member() {
        let layer =
            parse_vector_layer(STREAMS, "streams", GeometryKind::Line, &CRS::conus_albers()).unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.crs().epsg(), Some(5070));

        let first = &layer.features()[0];
        assert_eq!(first.id(), Some("17"));
        assert_eq!(first.get_property("channel_width"), Some(&AttributeValue::Float(20.0)));

        // index counts the skipped null-geometry feature
        let second = &layer.features()[1];
        assert_eq!(second.id(), Some("streams:2"));
        assert_eq!(second.get_property("channel_width"), Some(&AttributeValue::Int(4)));
    }

    #[test]
    fn test_declared_crs_must_match_working_crs() {
        let err = parse_vector_layer(STREAMS, "streams", GeometryKind::Line, &CRS::from_epsg(26918))
            .unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(..)));
    }

    #[test]
    fn test_wrong_kind_is_invalid_geometry() {
        let err =
            parse_vector_layer(STREAMS, "streams", GeometryKind::Polygon, &CRS::conus_albers())
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
    }

    #[test]
    fn test_points_rejected() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": null}
        ]}"#;
        let err = parse_vector_layer(text, "water", GeometryKind::Polygon, &CRS::conus_albers())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { feature: Some(ref id), .. } if id == "water:0"));
    }

    #[test]
    fn test_written_layer_reloads() {
        let layer =
            parse_vector_layer(STREAMS, "streams", GeometryKind::Line, &CRS::conus_albers()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.geojson");
        write_vector_layer(&layer, &path).unwrap();

        let back = read_vector_layer(&path, "streams", GeometryKind::Line, &CRS::conus_albers()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.features()[0].id(), Some("17"));
        assert_eq!(
            back.features()[0].get_property("name"),
            Some(&AttributeValue::String("Deer Creek".into()))
        );
    }

    #[test]
    fn test_garbage_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        std::fs::write(&path, "not json").unwrap();

        let err = read_vector_layer(&path, "bad", GeometryKind::Line, &CRS::conus_albers()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
