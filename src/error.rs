//! Error types for DoseWatch
//!
//! The state machine never fails; these errors come from the edges:
//! configuration loading, frame validation, and trace parsing.

use std::path::PathBuf;
use thiserror::Error;

/// DoseWatch errors
#[derive(Error, Debug)]
pub enum DoseError {
    // Configuration errors
    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to render config as TOML: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("threshold {name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("jaw limit {name} must be a finite non-negative pixel distance, got {value}")]
    InvalidJawLimit { name: &'static str, value: f64 },

    #[error("mouth-closed limit ({closed}px) must be below mouth-open limit ({open}px)")]
    JawLimitsOverlap { closed: f64, open: f64 },

    #[error("frame count {name} must be at least 1")]
    ZeroFrameCount { name: &'static str },

    // Frame boundary errors
    #[error("{class} confidence must be within [0, 1], got {value}")]
    ConfidenceOutOfRange { class: String, value: f64 },

    #[error("jaw drop must be a finite non-negative distance, got {0}")]
    InvalidJawDrop(f64),

    #[error("bounding box for {0} is inverted or non-finite")]
    InvalidBoundingBox(String),

    // Session errors
    #[error("session {0} is stopped; send START before streaming frames")]
    SessionStopped(String),

    // Trace errors
    #[error("malformed frame JSON: {0}")]
    FrameJson(serde_json::Error),

    #[error("frame trace line {line}: {source}")]
    TraceParse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("frame trace line {line}: {source}")]
    TraceFrame {
        line: usize,
        source: Box<DoseError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for DoseWatch operations
pub type Result<T> = std::result::Result<T, DoseError>;
