//! Runner error types

use scdguard_core::ScdError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures outside the rule engine: locating and reading configuration
/// and fixtures, and the final verdict of a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Missing configuration file path (use --config or SCDGUARD_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Scd(#[from] ScdError),
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
