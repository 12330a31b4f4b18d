//! Per-feature stream buffer widths
//!
//! Each stream is buffered by half its channel width plus the fixed
//! riparian width: `channel_width / 2 + buffer_distance_m`, in meters.

use crate::engine::GeometryEngine;
use crate::riparian::config::{MissingWidthPolicy, RiparianConfig};
use crate::vector::BufferSpec;
use riparia_core::vector::{Feature, GeometryKind, VectorLayer};
use riparia_core::{Error, Result};
use tracing::warn;

/// Resolves a buffer distance for every stream feature
#[derive(Debug, Clone, PartialEq)]
pub struct WidthCalculator {
    field: String,
    buffer_distance_m: f64,
    policy: MissingWidthPolicy,
}

/// Streams that survived width resolution and their distances, in order
#[derive(Debug, Clone)]
pub struct ResolvedWidths {
    pub layer: VectorLayer,
    pub spec: BufferSpec,
}

impl WidthCalculator {
    pub fn new(field: impl Into<String>, buffer_distance_m: f64, policy: MissingWidthPolicy) -> Self {
        Self {
            field: field.into(),
            buffer_distance_m,
            policy,
        }
    }

    pub fn from_config(config: &RiparianConfig) -> Self {
        Self::new(
            config.channel_width_field.clone(),
            config.buffer_distance_m,
            config.missing_width,
        )
    }

    /// Buffer distance for a channel of `channel_width_m`
    pub fn distance_for(&self, channel_width_m: f64) -> f64 {
        channel_width_m / 2.0 + self.buffer_distance_m
    }

    fn channel_width(&self, feature: &Feature) -> Option<f64> {
        feature
            .get_property(&self.field)
            .and_then(|v| v.as_f64())
            .filter(|w| w.is_finite() && *w > 0.0)
    }

    /// Resolve every feature's distance, applying the missing-width policy.
    ///
    /// Fails with `UnitMismatch` when the layer's CRS is not planar, since
    /// the widths are meters.
    pub fn resolve(&self, streams: &VectorLayer) -> Result<ResolvedWidths> {
        streams.crs().meters_per_unit()?;

        let mut kept = Vec::with_capacity(streams.len());
        let mut distances = Vec::with_capacity(streams.len());

        for feature in streams.iter() {
            let id = feature.id().unwrap_or("<unnamed>");
            let width = match (self.channel_width(feature), self.policy) {
                (Some(w), _) => w,
                (None, MissingWidthPolicy::Fail) => {
                    return Err(Error::MissingAttribute {
                        feature: feature.id().map(str::to_owned),
                        attribute: self.field.clone(),
                    })
                }
                (None, MissingWidthPolicy::Skip) => {
                    warn!("{}: stream {} has no usable `{}`, skipping", streams.name(), id, self.field);
                    continue;
                }
                (None, MissingWidthPolicy::Default(w)) => {
                    warn!(
                        "{}: stream {} has no usable `{}`, using {} m",
                        streams.name(),
                        id,
                        self.field,
                        w
                    );
                    w
                }
            };

            kept.push(feature.clone());
            distances.push(self.distance_for(width));
        }

        Ok(ResolvedWidths {
            layer: streams.derive(streams.name(), streams.kind(), kept)?,
            spec: BufferSpec::PerFeature(distances),
        })
    }

    /// Resolve widths and buffer each stream by its own distance
    pub fn buffer<E: GeometryEngine + ?Sized>(&self, engine: &E, streams: &VectorLayer, name: &str) -> Result<VectorLayer> {
        if streams.kind() != GeometryKind::Line {
            return Err(Error::InvalidParameter {
                name: "streams",
                value: streams.name().to_string(),
                reason: "variable-width buffering expects a line layer".into(),
            });
        }
        let resolved = self.resolve(streams)?;
        engine.buffer(&resolved.layer, &resolved.spec, name)
    }
}
