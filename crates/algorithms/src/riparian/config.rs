//! Run configuration

use crate::engine::GeoEngine;
use crate::vector::InvalidGeometryPolicy;
use riparia_core::{Error, Result, CRS};
use serde::{Deserialize, Serialize};

/// What to do with a stream feature whose channel width is missing,
/// non-numeric or not positive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingWidthPolicy {
    /// Fail the run with `MissingAttribute`
    #[default]
    Fail,
    /// Drop the feature with a warning
    Skip,
    /// Use this channel width (meters) instead, with a warning
    Default(f64),
}

/// Settings for one riparian mask run.
///
/// Distances and sizes are meters; they are converted to layer units with
/// the working CRS before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiparianConfig {
    /// Working CRS for inputs that do not declare one
    pub crs: String,
    /// Fixed riparian width around shorelines and water
    pub buffer_distance_m: f64,
    /// Minimum area for lotic water polygons
    pub lotic_min_acres: f64,
    /// Output cell size
    pub cell_size_m: f64,
    /// Land-use class attribute on the water layer; unset or empty treats
    /// every water feature as lotic
    pub water_class_field: Option<String>,
    pub lotic_codes: Vec<i64>,
    pub reservoir_codes: Vec<i64>,
    /// Stream attribute holding the channel width in meters
    pub channel_width_field: String,
    pub missing_width: MissingWidthPolicy,
    pub invalid_geometry: InvalidGeometryPolicy,
    /// Vertices per full circle for round caps and joins
    pub arc_segments: usize,
    /// Polygon parts below this area are dropped after an erase
    pub sliver_area_m2: f64,
}

impl Default for RiparianConfig {
    fn default() -> Self {
        Self {
            crs: "EPSG:5070".into(),
            buffer_distance_m: 30.0,
            lotic_min_acres: 25.0,
            cell_size_m: 10.0,
            water_class_field: Some("lu_code".into()),
            lotic_codes: vec![1300],
            reservoir_codes: vec![1210],
            channel_width_field: "channel_width".into(),
            missing_width: MissingWidthPolicy::Fail,
            invalid_geometry: InvalidGeometryPolicy::Repair,
            arc_segments: 64,
            sliver_area_m2: 0.01,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be a positive number".into(),
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be zero or more".into(),
        })
    }
}

impl RiparianConfig {
    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        self.working_crs()?;
        positive("buffer_distance_m", self.buffer_distance_m)?;
        positive("cell_size_m", self.cell_size_m)?;
        non_negative("lotic_min_acres", self.lotic_min_acres)?;
        non_negative("sliver_area_m2", self.sliver_area_m2)?;
        if let MissingWidthPolicy::Default(width) = self.missing_width {
            positive("missing_width.default", width)?;
        }
        if self.arc_segments < 8 {
            return Err(Error::InvalidParameter {
                name: "arc_segments",
                value: self.arc_segments.to_string(),
                reason: "need at least 8 vertices per circle".into(),
            });
        }
        if self.channel_width_field.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "channel_width_field",
                value: String::new(),
                reason: "must name an attribute".into(),
            });
        }
        Ok(())
    }

    /// Water class attribute, `None` when unset or empty
    pub fn water_class(&self) -> Option<&str> {
        self.water_class_field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn working_crs(&self) -> Result<CRS> {
        CRS::parse(&self.crs)
    }

    /// Geometry engine configured from these settings
    pub fn engine(&self) -> GeoEngine {
        GeoEngine {
            arc_segments: self.arc_segments,
            sliver_area_m2: self.sliver_area_m2,
            invalid_geometry: self.invalid_geometry,
        }
    }
}
