//! Error types for riparia

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for riparia operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid geometry{}: {reason}", feature_suffix(.feature))]
    InvalidGeometry {
        feature: Option<String>,
        reason: String,
    },

    #[error("unit mismatch for {crs}: {reason}")]
    UnitMismatch { crs: String, reason: String },

    #[error("missing attribute `{attribute}`{}", feature_suffix(.feature))]
    MissingAttribute {
        feature: Option<String>,
        attribute: String,
    },

    #[error("grid misalignment: {0}")]
    GridMisalignment(String),

    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], independent of where it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidGeometry,
    UnitMismatch,
    MissingAttribute,
    GridMisalignment,
    IoFailure,
    Other,
}

impl Error {
    /// Classify this error. Stage wrappers report the kind of the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidGeometry { .. } => ErrorKind::InvalidGeometry,
            Error::UnitMismatch { .. } => ErrorKind::UnitMismatch,
            Error::MissingAttribute { .. } => ErrorKind::MissingAttribute,
            Error::GridMisalignment(_) => ErrorKind::GridMisalignment,
            Error::Io(_) | Error::Format { .. } => ErrorKind::IoFailure,
            Error::Stage { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        }
    }

    /// Wrap this error with the name of the pipeline stage that raised it.
    pub fn in_stage(self, stage: &'static str) -> Self {
        Error::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Shorthand for an [`Error::InvalidGeometry`] tied to a feature.
    pub fn invalid_geometry(feature: Option<&str>, reason: impl Into<String>) -> Self {
        Error::InvalidGeometry {
            feature: feature.map(str::to_owned),
            reason: reason.into(),
        }
    }

    /// Stage name of the outermost stage wrapper, if any.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Error::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

fn feature_suffix(feature: &Option<String>) -> String {
    match feature {
        Some(id) => format!(" (feature {id})"),
        None => String::new(),
    }
}

/// Result type alias for riparia operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_keeps_kind() {
        let err = Error::MissingAttribute {
            feature: Some("streams:4".into()),
            attribute: "channel_width".into(),
        }
        .in_stage("streams");

        assert_eq!(err.kind(), ErrorKind::MissingAttribute);
        assert_eq!(err.stage(), Some("streams"));
        let msg = err.to_string();
        assert!(msg.contains("streams"), "{msg}");
        assert!(msg.contains("streams:4"), "{msg}");
    }

    #[test]
    fn test_io_kind() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }
}
