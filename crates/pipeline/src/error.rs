//! Error types for the pipeline crate.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline run.
///
/// Per-chunk completion failures do not appear here; they are reported in
/// [`PipelineReport::failed_chunks`](crate::runner::PipelineReport).
#[derive(Error, Debug)]
pub enum Error {
    /// The run's cancel token fired.
    #[error("pipeline run cancelled")]
    Cancelled,

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Completion error surfaced outside a chunk worker.
    #[error("completion error: {0}")]
    Completion(#[from] emend_completion::Error),

    /// Core error.
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

    /// Whether this error is (or wraps) a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Completion(e) => e.is_cancelled(),
            Self::Core(e) => e.is_cancelled(),
            Self::InvalidConfig { .. } => false,
        }
    }
}
