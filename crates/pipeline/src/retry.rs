//! Retry logic with exponential backoff.
//!
//! Wraps one fallible async call. Rate-limited failures wait for the smaller
//! of the server's retry-after hint and the jittered exponential delay;
//! transient failures use the exponential delay alone. Every wait races the
//! caller's cancel token.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use emend_completion::RetryClass;
use emend_core::CancelToken;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(
        rename = "initial_delay_ms",
        with = "duration_millis",
        default = "default_initial_delay"
    )]
    pub initial_delay: Duration,
    /// Cap on the exponential delay.
    #[serde(
        rename = "max_delay_ms",
        with = "duration_millis",
        default = "default_max_delay"
    )]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (typically 2.0).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Symmetric jitter fraction in `[0, 1]`: a delay `d` becomes a value in
    /// `[d * (1 - jitter), d * (1 + jitter)]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_delay() -> Duration {
    Duration::from_millis(1000)
}

const fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_jitter() -> f64 {
    0.2
}

impl RetryConfig {
    /// Set the retry cap.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the jitter fraction.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// No retries - execute only once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Reject out-of-range values.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when jitter is outside `[0, 1]` or the
    /// multiplier is below 1.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::invalid_config(format!(
                "jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config(format!(
                "backoff_multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Capped exponential delay for retry number `attempt` (0-based), before
    /// jitter: `initial_delay * multiplier^attempt`, at most `max_delay`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let base_ms = self.initial_delay.as_millis() as f64 * factor;
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms.max(0.0) as u64)
    }

    /// Jittered delay for retry `attempt` given a uniform sample in `[0, 1)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32, unit_sample: f64) -> Duration {
        let base_ms = self.base_delay(attempt).as_millis() as f64;
        let spread = self.jitter * (2.0 * unit_sample - 1.0);
        Duration::from_millis((base_ms * (1.0 + spread)).max(0.0) as u64)
    }

    /// How long to wait before retrying after a failure of `class`, or
    /// `None` when the failure is not retryable.
    ///
    /// A retry-after hint only shortens the wait; transient failures ignore
    /// hints entirely.
    #[must_use]
    pub fn delay_for(
        &self,
        attempt: u32,
        class: &RetryClass,
        now: DateTime<Utc>,
        unit_sample: f64,
    ) -> Option<Duration> {
        let backoff = self.backoff_delay(attempt, unit_sample);
        match class {
            RetryClass::Fatal => None,
            RetryClass::Transient | RetryClass::RateLimited(None) => Some(backoff),
            RetryClass::RateLimited(Some(hint)) => Some(hint.delay_from(now).min(backoff)),
        }
    }
}

/// Predicate for determining how an error should be retried.
pub trait Retryable: Sized {
    /// Retry classification of this error.
    fn retry_class(&self) -> RetryClass;

    /// Whether this error is a cancellation (never retried).
    fn is_cancelled(&self) -> bool;

    /// The value to return when the cancel token fires during a wait.
    fn cancelled() -> Self;
}

impl Retryable for emend_completion::Error {
    fn retry_class(&self) -> RetryClass {
        self.classify()
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }

    fn cancelled() -> Self {
        Self::Cancelled
    }
}

/// Run `operation` until it succeeds, fails non-retryably, exhausts
/// `max_retries`, or `cancel` fires.
///
/// `operation` receives the 0-based attempt number.
///
/// # Errors
/// Returns the last error from `operation`, or `E::cancelled()` if the
/// token fired first.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancelToken,
    mut operation: F,
) -> std::result::Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(E::cancelled());
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(E::cancelled()),
            outcome = operation(attempt) => outcome,
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if error.is_cancelled() {
            return Err(error);
        }
        if attempt >= config.max_retries {
            warn!(attempts = attempt + 1, error = %error, "Retries exhausted");
            return Err(error);
        }
        let sample = rand::thread_rng().gen_range(0.0..1.0);
        let Some(delay) = config.delay_for(attempt, &error.retry_class(), Utc::now(), sample)
        else {
            debug!(attempt, error = %error, "Error is not retryable");
            return Err(error);
        };

        warn!(
            attempt,
            delay_ms = ?delay.as_millis(),
            remaining = config.max_retries - attempt,
            error = %error,
            "Retrying after delay"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(E::cancelled()),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Serialization helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Instant;

    use super::*;
    use emend_completion::{Error as CompletionError, RetryAfter};

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter(0.0)
    }

    #[test]
    fn test_base_delay_exponential() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: 0.0,
            ..Default::default()
        };

        assert_eq!(config.base_delay(0), Duration::from_millis(100));
        assert_eq!(config.base_delay(1), Duration::from_millis(200));
        assert_eq!(config.base_delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_base_delay_capped() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 10.0,
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };

        // 1 * 10^3 = 1000 seconds, but capped at 5
        assert_eq!(config.base_delay(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_is_symmetric() {
        let config = RetryConfig::default()
            .with_initial_delay(Duration::from_millis(1000))
            .with_jitter(0.5);
        assert_eq!(config.backoff_delay(0, 0.0), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(0, 0.5), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(0, 1.0), Duration::from_millis(1500));
    }

    #[test]
    fn test_rate_limit_hint_takes_the_smaller_delay() {
        let config = RetryConfig::default().with_jitter(0.0);
        let now = Utc::now();
        let short = RetryClass::RateLimited(Some(RetryAfter::Seconds(0)));
        assert_eq!(config.delay_for(0, &short, now, 0.5), Some(Duration::ZERO));

        let long = RetryClass::RateLimited(Some(RetryAfter::Seconds(600)));
        assert_eq!(
            config.delay_for(0, &long, now, 0.5),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_transient_and_fatal_delays() {
        let config = RetryConfig::default().with_jitter(0.0);
        let now = Utc::now();
        assert_eq!(
            config.delay_for(1, &RetryClass::Transient, now, 0.5),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(config.delay_for(0, &RetryClass::Fatal, now, 0.5), None);
    }

    #[test]
    fn test_validate_rejects_bad_jitter() {
        assert!(RetryConfig::default().with_jitter(1.5).validate().is_err());
        assert!(RetryConfig::default().with_jitter(-0.1).validate().is_err());
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_reads_millis_from_toml_shape() -> std::result::Result<(), serde_json::Error> {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_retries": 5, "initial_delay_ms": 250}"#)?;
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let attempts = RefCell::new(0);
        let result = retry_with_backoff(&fast(), &CancelToken::new(), |_| {
            *attempts.borrow_mut() += 1;
            let count = *attempts.borrow();
            async move {
                if count < 3 {
                    Err(CompletionError::timeout(10))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(*attempts.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let attempts = RefCell::new(0);
        let config = fast().with_max_retries(2);
        let result: std::result::Result<i32, _> =
            retry_with_backoff(&config, &CancelToken::new(), |_| {
                *attempts.borrow_mut() += 1;
                async { Err(CompletionError::connection_failed("refused")) }
            })
            .await;

        assert!(matches!(result, Err(CompletionError::ConnectionFailed { .. })));
        assert_eq!(*attempts.borrow(), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let attempts = RefCell::new(0);
        let result: std::result::Result<i32, _> =
            retry_with_backoff(&fast(), &CancelToken::new(), |_| {
                *attempts.borrow_mut() += 1;
                async {
                    Err(CompletionError::Status {
                        status: 401,
                        body: String::new(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*attempts.borrow(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_calls_are_retried() {
        let attempts = RefCell::new(0);
        let result = retry_with_backoff(&fast(), &CancelToken::new(), |attempt| {
            *attempts.borrow_mut() += 1;
            async move {
                if attempt == 0 {
                    Err(CompletionError::RateLimited {
                        retry_after: Some(RetryAfter::Seconds(0)),
                    })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some("done"));
        assert_eq!(*attempts.borrow(), 2);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff_wait() {
        let config = RetryConfig::default()
            .with_initial_delay(Duration::from_secs(30))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter(0.0);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: std::result::Result<i32, _> = retry_with_backoff(&config, &cancel, |_| async {
            Err(CompletionError::timeout(1))
        })
        .await;

        assert!(matches!(result, Err(CompletionError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancelled_error_is_never_retried() {
        let attempts = RefCell::new(0);
        let result: std::result::Result<i32, _> =
            retry_with_backoff(&fast(), &CancelToken::new(), |_| {
                *attempts.borrow_mut() += 1;
                async { Err(CompletionError::Cancelled) }
            })
            .await;

        assert!(matches!(result, Err(CompletionError::Cancelled)));
        assert_eq!(*attempts.borrow(), 1);
    }
}
