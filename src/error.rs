// src/error.rs
use thiserror::Error;

/// Reasons a landmark set cannot produce a raw pose this call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoseError {
    #[error("landmark set has {found} points, need 21")]
    Malformed { found: usize },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    #[error("wrist and middle knuckle coincide")]
    Degenerate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config value `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
