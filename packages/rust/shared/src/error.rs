//! Error types for chaingraph.
//!
//! Library crates use [`GraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all chaingraph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a collaborator service.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed collaborator output (candidate bundle, plan, advice).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Evidence retrieval failed; the issuing task is failed.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// The generation collaborator could not produce a candidate.
    #[error("generation error: {0}")]
    Generation(String),

    /// A single claim verification failed.
    #[error("verification error: {0}")]
    Verification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad task payload, invalid name, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
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
