//! Error types for the completion boundary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for completion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Server hint for when a rate-limited request may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    /// Wait this many seconds.
    Seconds(u64),
    /// Retry at or after this instant.
    At(DateTime<Utc>),
}

impl RetryAfter {
    /// Parse a `Retry-After` header value (delta-seconds or an HTTP date).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(secs) = value.parse::<u64>() {
            return Some(Self::Seconds(secs));
        }
        DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|at| Self::At(at.with_timezone(&Utc)))
    }

    /// How long to wait counting from `now`. Dates in the past yield zero.
    #[must_use]
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Self::Seconds(secs) => Duration::from_secs(*secs),
            Self::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

/// How a failed call should be treated by a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The service asked us to slow down, optionally saying for how long.
    RateLimited(Option<RetryAfter>),
    /// Network-level or server-side failure worth another attempt.
    Transient,
    /// Retrying will not help.
    Fatal,
}

/// Errors that can occur while requesting suggestions.
#[derive(Error, Debug)]
pub enum Error {
    /// The service answered 429.
    #[error("rate limited by completion service")]
    RateLimited { retry_after: Option<RetryAfter> },

    /// Failed to reach the service.
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Request timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-success HTTP status other than 429.
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body could not be read.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The caller's cancel token fired.
    #[error("request cancelled")]
    Cancelled,

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Whether this error is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classify this error for retrying.
    ///
    /// 408 and 5xx statuses count as transient alongside connection and
    /// timeout failures. Cancellation is never retryable.
    #[must_use]
    pub const fn classify(&self) -> RetryClass {
        match self {
            Self::RateLimited { retry_after } => RetryClass::RateLimited(*retry_after),
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => RetryClass::Transient,
            Self::Status { status, .. } if *status == 408 || *status >= 500 => {
                RetryClass::Transient
            }
            _ => RetryClass::Fatal,
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self.classify(), RetryClass::Fatal)
    }
}

impl From<emend_core::Error> for Error {
    fn from(err: emend_core::Error) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::invalid_response(err.to_string())
        }
    }
}
