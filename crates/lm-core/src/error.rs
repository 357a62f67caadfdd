//! Error types for lm-core

use thiserror::Error;

/// Core error type for Lendmill
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Required configuration value is absent
    #[error("[E001] Missing configuration: {message}")]
    ConfigMissing { message: String },

    /// E002: Configuration value present but invalid
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Value could not be parsed
    #[error("[E003] Parse error: {message}")]
    ParseError { message: String },

    /// E004: IO error
    #[error("[E004] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
