//! Error types for rekrake.
//!
//! Failures that end a run (bad credentials) are separated from failures
//! that only end the current file (service rejections, transport errors,
//! replace problems). The coordinator never aborts on the latter.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rekrake operations.
#[derive(Debug, Error)]
pub enum RekrakeError {
    /// Credential validation failed. The only fatal error class: a run
    /// aborts before any file is touched.
    #[error("Credential error: {message}")]
    Credential { message: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The optimization service answered but rejected the request.
    #[error("Service error: {message}")]
    Service { message: String },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for rekrake operations.
pub type Result<T> = std::result::Result<T, RekrakeError>;

impl From<std::io::Error> for RekrakeError {
    fn from(err: std::io::Error) -> Self {
        RekrakeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RekrakeError {
    fn from(err: serde_json::Error) -> Self {
        RekrakeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for RekrakeError {
    fn from(err: reqwest::Error) -> Self {
        RekrakeError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RekrakeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RekrakeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for failures below the service level (connection refused,
    /// timeout, DNS). The client prefixes these distinctly in failed
    /// optimization results so reports can tell network from service.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RekrakeError::Network { .. } | RekrakeError::DownloadFailed { .. }
        )
    }

    /// True if this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RekrakeError::Credential { .. })
    }
}
