//! Error types for ExpoHarvest.
//!
//! Library crates use [`ExpoHarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ExpoHarvest operations.
#[derive(Debug, thiserror::Error)]
pub enum ExpoHarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Bad input to a job command (empty show name, missing scope, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Extractor/source failure (bad feed shape, source exhausted abnormally).
    #[error("extract error: {0}")]
    Extract(String),

    /// Network/HTTP error inside an extractor source.
    #[error("network error: {0}")]
    Network(String),

    /// Control command targeted a job that is not in the live registry.
    /// The job has either finished or never existed in this process.
    #[error("crawler is not currently running: {job_id}")]
    NotRunning { job_id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExpoHarvestError>;

impl ExpoHarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-running error for a missing registry entry.
    pub fn not_running(job_id: impl Into<String>) -> Self {
        Self::NotRunning {
            job_id: job_id.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
