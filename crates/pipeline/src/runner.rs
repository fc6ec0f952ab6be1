//! End-to-end correction run.
//!
//! Splits the document, sends each chunk through the retry controller to
//! the completion service with bounded concurrency, anchors the replies,
//! then merges and overlap-filters everything into one [`CorrectionSet`].
//!
//! A chunk whose call fails after retries is recorded in
//! [`PipelineReport::failed_chunks`] and the run carries on. Cancellation
//! fails the whole run.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use emend_completion::{ChunkRequest, CompletionService};
use emend_core::{CancelToken, Chunk, CorrectionSet, MatchResult, RawSuggestion};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anchor::{AnchorConfig, AnchorResolver};
use crate::chunker::{ChunkerConfig, split};
use crate::error::{Error, Result};
use crate::overlap::{DroppedCorrection, filter_overlaps};
use crate::pool::{PoolError, PoolOptions, ProgressFn, run_pool};
use crate::retry::{RetryConfig, Retryable, retry_with_backoff};

/// Default number of chunks in flight.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default characters of surrounding text sent with each chunk.
pub const DEFAULT_CONTEXT_CHARS: usize = 300;

/// Settings for a [`CorrectionPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunking: ChunkerConfig,
    pub retry: RetryConfig,
    /// Maximum chunks in flight.
    pub concurrency: usize,
    /// Bytes of neighbouring text sent on each side of a chunk.
    pub context_chars: usize,
    pub anchor: AnchorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            retry: RetryConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            context_chars: DEFAULT_CONTEXT_CHARS,
            anchor: AnchorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with the given chunk size and concurrency.
    #[must_use]
    pub fn new(max_chunk_size: usize, concurrency: usize) -> Self {
        Self {
            chunking: ChunkerConfig::with_max_chunk_size(max_chunk_size),
            concurrency,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_context_chars(mut self, context_chars: usize) -> Self {
        self.context_chars = context_chars;
        self
    }

    #[must_use]
    pub const fn with_anchor(mut self, anchor: AnchorConfig) -> Self {
        self.anchor = anchor;
        self
    }

    /// Reject out-of-range values.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for zero concurrency, a zero chunk size, or
    /// bad retry settings.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::invalid_config("concurrency must be greater than zero"));
        }
        self.chunking.validate()?;
        self.retry.validate()
    }
}

/// A chunk whose completion call failed for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub reason: String,
}

/// A suggestion that could not be anchored, tagged with its chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedSuggestion {
    pub chunk_index: usize,
    pub suggestion: RawSuggestion,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// Anchored, non-overlapping corrections in document order.
    pub corrections: CorrectionSet,
    pub unmatched: Vec<UnmatchedSuggestion>,
    /// Corrections removed by overlap filtering.
    pub dropped: Vec<DroppedCorrection>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub chunk_count: usize,
    /// Suggestions discarded because their text was already anchored.
    pub duplicates: usize,
}

impl PipelineReport {
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            chunks: self.chunk_count,
            failed_chunks: self.failed_chunks.len(),
            corrections: self.corrections.len(),
            unmatched: self.unmatched.len(),
            dropped: self.dropped.len(),
            duplicates: self.duplicates,
        }
    }

    /// Whether any chunk failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_chunks.is_empty()
    }
}

/// Counts from a [`PipelineReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub chunks: usize,
    pub failed_chunks: usize,
    pub corrections: usize,
    pub unmatched: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks ({} failed): {} corrections, {} unmatched, {} dropped, {} duplicates",
            self.chunks,
            self.failed_chunks,
            self.corrections,
            self.unmatched,
            self.dropped,
            self.duplicates
        )
    }
}

/// What one chunk worker produced.
#[derive(Debug)]
enum ChunkOutcome {
    Anchored { index: usize, result: MatchResult },
    Failed(ChunkFailure),
}

/// Runs documents through chunking, completion, and anchoring.
#[derive(Debug)]
pub struct CorrectionPipeline<S> {
    service: S,
    config: PipelineConfig,
    resolver: AnchorResolver,
}

impl<S: CompletionService> CorrectionPipeline<S> {
    /// Create a pipeline.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(service: S, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let resolver = AnchorResolver::new(config.anchor);
        Ok(Self {
            service,
            config,
            resolver,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Run the whole document.
    ///
    /// `on_progress` is called after each chunk settles.
    ///
    /// # Errors
    /// Returns `Error::Cancelled` if `cancel` fires before every chunk has
    /// settled. Chunk failures are reported, not returned.
    pub async fn run(
        &self,
        document: &str,
        cancel: &CancelToken,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let chunks = split(document, &self.config.chunking)?;
        let chunk_count = chunks.len();
        info!(
            document_len = document.len(),
            chunks = chunk_count,
            concurrency = self.config.concurrency,
            "Starting correction run"
        );

        let mut options = PoolOptions::new(self.config.concurrency, cancel.clone());
        if let Some(on_progress) = on_progress {
            options = options.with_progress(on_progress);
        }

        let outcomes = run_pool(
            chunks,
            |_, chunk| self.process_chunk(chunk, document, cancel),
            options,
        )
        .await
        .map_err(|err| match err {
            PoolError::Cancelled => Error::Cancelled,
            PoolError::Worker { source, .. } => source,
        })?;

        let mut merged = MatchResult::default();
        let mut unmatched = Vec::new();
        let mut failed_chunks = Vec::new();
        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Anchored { index, mut result } => {
                    unmatched.extend(result.unmatched.drain(..).map(|suggestion| {
                        UnmatchedSuggestion {
                            chunk_index: index,
                            suggestion,
                        }
                    }));
                    merged.merge(result);
                }
                ChunkOutcome::Failed(failure) => failed_chunks.push(failure),
            }
        }

        let filtered = filter_overlaps(merged.mapped);
        let report = PipelineReport {
            corrections: CorrectionSet::from_filtered(filtered.kept),
            unmatched,
            dropped: filtered.dropped,
            failed_chunks,
            chunk_count,
            duplicates: merged.duplicates,
        };

        if report.is_partial() {
            warn!(
                failed = report.failed_chunks.len(),
                chunks = chunk_count,
                "Some chunks failed; continuing with partial results"
            );
        }
        info!(
            summary = %report.summary(),
            duration_ms = started.elapsed().as_millis(),
            "Correction run finished"
        );
        Ok(report)
    }

    async fn process_chunk(
        &self,
        chunk: Chunk,
        document: &str,
        cancel: &CancelToken,
    ) -> Result<ChunkOutcome> {
        let request = ChunkRequest::for_chunk(&chunk, document, self.config.context_chars);
        let request = &request;
        let reply = retry_with_backoff(&self.config.retry, cancel, |attempt| {
            if attempt > 0 {
                debug!(chunk_index = chunk.index, attempt, "Retrying chunk");
            }
            self.service.suggest(request, cancel)
        })
        .await;

        match reply {
            Ok(suggestions) => {
                let result = self.resolver.resolve(&suggestions, &chunk.text, chunk.start);
                debug!(
                    chunk_index = chunk.index,
                    mapped = result.mapped.len(),
                    unmatched = result.unmatched.len(),
                    "Chunk anchored"
                );
                Ok(ChunkOutcome::Anchored {
                    index: chunk.index,
                    result,
                })
            }
            Err(err) if Retryable::is_cancelled(&err) => Err(Error::Cancelled),
            Err(err) => {
                warn!(chunk_index = chunk.index, error = %err, "Chunk failed");
                Ok(ChunkOutcome::Failed(ChunkFailure {
                    index: chunk.index,
                    start: chunk.start,
                    end: chunk.end,
                    reason: err.to_string(),
                }))
            }
        }
    }
}

/// Tracks the in-flight run so a new one cancels its predecessor.
#[derive(Debug, Default)]
pub struct RunController {
    current: Mutex<Option<CancelToken>>,
}

impl RunController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any previous run and return the token for a new one.
    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(token.clone()) {
            debug!("Cancelling previous run");
            previous.cancel();
        }
        token
    }

    /// Cancel the in-flight run, if any.
    pub fn cancel_current(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }
}
