//! Core error types for tendril operations.
//!
//! All errors are explicit and typed. Nothing is retried or swallowed:
//! every failure travels back to whoever drives the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for tendril operations.
#[derive(Debug, Error)]
pub enum Error {
    // Description errors
    #[error("malformed description: {reason}")]
    MalformedDescription { reason: String },

    // Host binder errors
    #[error("host operation '{operation}' failed: {reason}")]
    HostFailed { operation: String, reason: String },

    // Engine invariants
    #[error("internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    // Parsing errors
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    // Generic I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed description error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDescription {
            reason: reason.into(),
        }
    }

    /// Create a host failure error.
    pub fn host_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HostFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal invariant error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the host binder.
    pub const fn is_host_failure(&self) -> bool {
        matches!(self, Self::HostFailed { .. })
    }
}
