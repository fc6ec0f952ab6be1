//! Configuration for the HTTP completion client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Configuration for [`HttpCompletionClient`](crate::client::HttpCompletionClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the completion service.
    #[serde(default)]
    pub base_url: Option<Url>,

    /// Path joined onto `base_url` for suggestion requests.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,

    /// Model name forwarded to the service untouched.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoint: default_endpoint(),
            timeout: default_timeout(),
            model: None,
        }
    }
}

impl CompletionConfig {
    /// Config pointing at `base_url` with defaults otherwise.
    #[must_use]
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Default::default()
        }
    }

    /// Set the request path.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Apply `EMEND_COMPLETION_URL` and `EMEND_MODEL` on top of `self`.
    ///
    /// An unparsable URL in the environment is ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EMEND_COMPLETION_URL") {
            if let Ok(parsed) = url.parse() {
                self.base_url = Some(parsed);
            }
        }
        if let Ok(model) = std::env::var("EMEND_MODEL") {
            self.model = Some(model);
        }
        self
    }

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a JSON or TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        if path.extension().is_some_and(|e| e == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            toml::from_str(&content)
                .map_err(|e| Error::config_error(format!("Failed to parse config: {e}")))
        }
    }

    /// Full URL suggestion requests are sent to.
    ///
    /// # Errors
    /// Returns `ConfigError` when no base URL is set, or a parse error when
    /// the endpoint cannot be joined.
    pub fn endpoint_url(&self) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| Error::config_error("completion base_url is not set"))?;
        Ok(base.join(&self.endpoint)?)
    }

    /// Reject values the client cannot work with.
    ///
    /// # Errors
    /// Returns `ConfigError` for a zero timeout or an empty endpoint.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::config_error("timeout must be greater than zero"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::config_error("endpoint must not be empty"));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "/v1/corrections".to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
