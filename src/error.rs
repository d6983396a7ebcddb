//! Error types for CaseBridge
//!
//! Defines a comprehensive error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for CaseBridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Comprehensive error type for CaseBridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Integration errors (GitHub, Salesforce)
    #[error("Integration error: {0}")]
    Integration(String),

    /// Operation required an embedded sync record and none was found
    #[error("No linked record: {0}")]
    NotLinked(String),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}
