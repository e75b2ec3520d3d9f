//! Error types for the explainer.
//!
//! Library crates use [`ExplainerError`] via `thiserror`.
//! The server binary wraps this with `color-eyre` for rich diagnostics.
//!
//! Malformed model output is *not* represented here: JSON extraction failures
//! are a recoverable result local to the core crate and never reach this type.

use std::path::PathBuf;

/// Top-level error type for all explainer operations.
#[derive(Debug, thiserror::Error)]
pub enum ExplainerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Text-generation backend unreachable or returned a failure status.
    #[error("generation error: {0}")]
    Generation(String),

    /// Web or similarity search collaborator failed.
    #[error("search error: {0}")]
    Search(String),

    /// Document index build or load failure.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stage produced output that breaks its declared contract.
    #[error("contract violation in {stage}: {message}")]
    Contract { stage: String, message: String },

    /// Invalid caller input (e.g. a blank query at the API boundary).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExplainerError>;

impl ExplainerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a contract violation for the named stage.
    pub fn contract(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Contract {
            stage: stage.into(),
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

    /// Coarse failure class, safe to show to API callers.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Generation(_) => "generation",
            Self::Search(_) => "search",
            Self::Retrieval(_) | Self::Storage(_) | Self::Io { .. } => "retrieval",
            Self::Contract { .. } => "contract",
            Self::Validation { .. } => "validation",
        }
    }
}
