//! Error types for review operations.

use thiserror::Error;

/// Result type for review operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Review errors. A failed operation leaves the session unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no correction at index {index} ({len} pending)")]
    NoSuchCorrection { index: usize, len: usize },

    /// The document no longer holds the correction's original text.
    #[error("correction {index} at {start}..{end} no longer matches the document")]
    StaleSpan {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("core error: {0}")]
    Core(#[from] emend_core::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
