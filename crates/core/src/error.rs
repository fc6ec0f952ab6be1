//! Core error types for emend operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for emend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The caller's cancel token fired.
    #[error("operation cancelled")]
    Cancelled,

    // Position errors
    #[error("span {start}..{end} is out of bounds for text of length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("index {index} is out of range for {len} corrections")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("shifting span {start}..{end} by {delta} overflows")]
    ShiftOverflow { start: usize, end: usize, delta: isize },

    // Invariant errors
    #[error("correction set invariant violated: {reason}")]
    InvariantViolation { reason: String },
}

impl Error {
    /// Create an out-of-bounds span error.
    pub const fn span_out_of_bounds(start: usize, end: usize, len: usize) -> Self {
        Self::SpanOutOfBounds { start, end, len }
    }

    /// Create an index out-of-range error.
    pub const fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create an invariant violation error.
    pub fn invariant_violation(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Check if this error is a cancellation.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
