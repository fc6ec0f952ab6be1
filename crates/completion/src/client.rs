//! HTTP completion client.
//!
//! POSTs each chunk as JSON to a configured endpoint and parses the reply
//! with [`parse_suggestions`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use emend_core::{CancelToken, RawSuggestion};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::CompletionConfig;
use crate::error::{Error, Result, RetryAfter};
use crate::response::parse_suggestions;
use crate::service::{ChunkRequest, CompletionService};

/// Longest error body kept in `Error::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Wire shape of one request.
#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    text: &'a str,
    context_before: &'a str,
    context_after: &'a str,
    chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// Completion service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    config: Arc<CompletionConfig>,
    endpoint: Url,
    http_client: reqwest::Client,
}

impl HttpCompletionClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or has no base URL.
    pub fn with_config(config: CompletionConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::connection_failed(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            endpoint,
            http_client,
        })
    }

    /// Create a client for `base_url` with default settings.
    ///
    /// # Errors
    /// Returns an error if the endpoint cannot be joined onto `base_url`.
    pub fn with_url(base_url: Url) -> Result<Self> {
        Self::with_config(CompletionConfig::with_base_url(base_url))
    }

    /// The URL requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: &ChunkRequest) -> Result<Vec<RawSuggestion>> {
        let body = RequestBody {
            text: &request.text,
            context_before: &request.context_before,
            context_after: &request.context_after,
            chunk_index: request.chunk_index,
            model: self.config.model.as_deref(),
        };
        let start = Instant::now();

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(RetryAfter::parse);
            warn!(
                chunk_index = request.chunk_index,
                ?retry_after,
                "Completion service rate limited the request"
            );
            return Err(Error::RateLimited { retry_after });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::invalid_response(e.to_string()))?;
        let suggestions = parse_suggestions(&text);
        debug!(
            chunk_index = request.chunk_index,
            suggestions = suggestions.len(),
            duration_ms = start.elapsed().as_millis(),
            "Completion request finished"
        );
        Ok(suggestions)
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::timeout(u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            Error::connection_failed(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn suggest(
        &self,
        request: &ChunkRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<RawSuggestion>> {
        cancel.check()?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(chunk_index = request.chunk_index, "Completion request cancelled");
                Err(Error::Cancelled)
            }
            result = self.send(request) => result,
        }
    }
}
