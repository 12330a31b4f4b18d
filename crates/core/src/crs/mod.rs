//! Coordinate Reference System handling
//!
//! riparia never reprojects. What it needs from a CRS is to know whether
//! coordinates are planar and, if so, how many meters one coordinate unit
//! spans, so that meter-based buffer widths, cell sizes and area thresholds
//! can be expressed in layer units.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Meters per US survey foot.
pub const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;

/// Meters per international foot.
pub const INTERNATIONAL_FOOT: f64 = 0.3048;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation (primary)
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

/// What kind of coordinates a CRS produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrsKind {
    /// Angular (longitude/latitude) coordinates
    Geographic,
    /// Planar coordinates; one unit spans `meters_per_unit` meters
    Projected { meters_per_unit: f64 },
    /// Not enough information to tell
    Unknown,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// NAD83 / Conus Albers (EPSG:5070), the equal-area CRS the
    /// Chesapeake Bay land-use products are delivered in
    pub fn conus_albers() -> Self {
        Self::from_epsg(5070)
    }

    /// Parse a user-supplied CRS definition.
    ///
    /// Accepts `EPSG:<code>`, OGC URNs (`urn:ogc:def:crs:EPSG::<code>`),
    /// OGC CRS84 names, WKT and PROJ strings.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let upper = s.to_ascii_uppercase();

        if upper == "URN:OGC:DEF:CRS:OGC:1.3:CRS84" || upper == "CRS84" {
            return Ok(Self::wgs84());
        }
        if let Some(code) = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:"))
        {
            // URNs may carry a version between the colons: EPSG:9.8:5070
            let code = code.rsplit(':').next().unwrap_or(code);
            return code
                .trim()
                .parse::<u32>()
                .map(Self::from_epsg)
                .map_err(|_| Error::InvalidParameter {
                    name: "crs",
                    value: s.to_string(),
                    reason: "EPSG code is not a number".into(),
                });
        }
        if s.starts_with('+') {
            return Ok(Self::from_proj(s));
        }
        if s.contains('[') {
            return Ok(Self::from_wkt(s));
        }

        Err(Error::InvalidParameter {
            name: "crs",
            value: s.to_string(),
            reason: "expected EPSG:<code>, a URN, WKT or a PROJ string".into(),
        })
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison; imperfect for WKT written by different tools
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Classify the CRS as geographic or projected.
    pub fn kind(&self) -> CrsKind {
        if let Some(code) = self.epsg {
            return epsg_kind(code);
        }
        if let Some(wkt) = &self.wkt {
            return wkt_kind(wkt);
        }
        if let Some(proj) = &self.proj {
            return proj_kind(proj);
        }
        CrsKind::Unknown
    }

    /// Whether coordinates are angular
    pub fn is_geographic(&self) -> bool {
        matches!(self.kind(), CrsKind::Geographic)
    }

    /// Meters spanned by one coordinate unit.
    ///
    /// Fails with [`Error::UnitMismatch`] for geographic or unclassifiable
    /// CRSs: distances and areas in degrees are never silently accepted.
    pub fn meters_per_unit(&self) -> Result<f64> {
        match self.kind() {
            CrsKind::Projected { meters_per_unit } => Ok(meters_per_unit),
            CrsKind::Geographic => Err(Error::UnitMismatch {
                crs: self.identifier(),
                reason: "geographic CRS; distances and areas need a projected CRS".into(),
            }),
            CrsKind::Unknown => Err(Error::UnitMismatch {
                crs: self.identifier(),
                reason: "cannot determine the linear unit of this CRS".into(),
            }),
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt
                .char_indices()
                .nth(50)
                .map(|(i, _)| i)
                .unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

fn epsg_kind(code: u32) -> CrsKind {
    match code {
        // EPSG geographic 2D/3D CRSs live in this block (4326, 4269, 4258, ...)
        4000..=4999 => CrsKind::Geographic,
        // NAD83 State Plane zones in US survey feet
        2225..=2290 => CrsKind::Projected {
            meters_per_unit: US_SURVEY_FOOT,
        },
        _ => CrsKind::Projected {
            meters_per_unit: 1.0,
        },
    }
}

fn wkt_kind(wkt: &str) -> CrsKind {
    let upper = wkt.trim_start().to_ascii_uppercase();
    let root = upper.split('[').next().unwrap_or("").trim();

    match root {
        "GEOGCS" | "GEOGCRS" | "GEODCRS" | "GEOGRAPHICCRS" => CrsKind::Geographic,
        "PROJCS" | "PROJCRS" | "PROJECTEDCRS" => CrsKind::Projected {
            meters_per_unit: wkt_linear_unit(&upper).unwrap_or(1.0),
        },
        _ => CrsKind::Unknown,
    }
}

/// Factor of the last non-angular `UNIT[...]`/`LENGTHUNIT[...]` in a projected WKT.
fn wkt_linear_unit(upper: &str) -> Option<f64> {
    let mut found = None;
    let mut rest = upper;

    while let Some(pos) = rest.find("UNIT[") {
        let body = &rest[pos + 5..];
        let close = body.find(']').unwrap_or(body.len());
        let mut parts = body[..close].splitn(3, ',');
        let name = parts.next().unwrap_or("").trim().trim_matches('"');
        let factor = parts.next().and_then(|f| f.trim().parse::<f64>().ok());

        let angular = ["DEGREE", "RADIAN", "GRAD", "ARC"]
            .iter()
            .any(|a| name.contains(a));
        if !angular {
            if let Some(f) = factor {
                found = Some(f);
            }
        }
        rest = &body[close.min(body.len())..];
    }

    found
}

fn proj_kind(proj: &str) -> CrsKind {
    let mut geographic = false;
    let mut factor = None;

    for token in proj.split_whitespace() {
        let token = token.trim_start_matches('+');
        let (key, value) = match token.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match key {
            "proj" => {
                geographic = matches!(value, "longlat" | "latlong" | "lonlat" | "latlon");
            }
            "to_meter" => factor = value.parse::<f64>().ok(),
            "units" if factor.is_none() => {
                factor = match value {
                    "m" => Some(1.0),
                    "km" => Some(1000.0),
                    "ft" => Some(INTERNATIONAL_FOOT),
                    "us-ft" => Some(US_SURVEY_FOOT),
                    _ => None,
                };
            }
            _ => {}
        }
    }

    if geographic {
        CrsKind::Geographic
    } else {
        CrsKind::Projected {
            meters_per_unit: factor.unwrap_or(1.0),
        }
    }
}
