//! Behavioral tests for CorrectionPipeline
//!
//! These tests document WHAT a correction run does, not HOW it does it:
//! - Every chunk is sent to the completion service
//! - Suggestions come back anchored to document offsets
//! - A chunk that keeps failing is reported without failing the run
//! - Cancelling the token fails the run

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use emend_completion::{ChunkRequest, CompletionService, Error as CompletionError};
use emend_core::{CancelToken, RawSuggestion};
use emend_pipeline::{
    CorrectionPipeline, Error, PipelineConfig, PoolProgress, RetryConfig, RunController,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const PARAGRAPH_LEN: usize = 80;
const TYPO_OFFSET: usize = 21;

/// Seven 80-byte paragraphs, each with one "teh" at byte 21.
fn seven_paragraphs() -> String {
    (0..7)
        .map(|i| {
            let body = format!("Paragraph {i} contains teh typo");
            format!("{body:<78}\n\n")
        })
        .collect()
}

fn config() -> PipelineConfig {
    PipelineConfig::new(100, 3).with_retry(
        RetryConfig::default()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5)),
    )
}

/// Suggests "teh" -> "the" for every chunk, failing chunks in `fail`.
struct ScriptedService {
    fail: Vec<usize>,
    failure: fn() -> CompletionError,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    extra: Vec<RawSuggestion>,
}

impl ScriptedService {
    fn new() -> Self {
        Self {
            fail: Vec::new(),
            failure: || CompletionError::Status {
                status: 400,
                body: "bad request".to_string(),
            },
            delay: Duration::from_millis(5),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            extra: Vec::new(),
        }
    }

    fn failing(mut self, index: usize) -> Self {
        self.fail.push(index);
        self
    }

    fn with_failure(mut self, failure: fn() -> CompletionError) -> Self {
        self.failure = failure;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_extra(mut self, suggestion: RawSuggestion) -> Self {
        self.extra.push(suggestion);
        self
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn suggest(
        &self,
        request: &ChunkRequest,
        cancel: &CancelToken,
    ) -> emend_completion::Result<Vec<RawSuggestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(CompletionError::Cancelled),
            () = tokio::time::sleep(self.delay) => {
                if self.fail.contains(&request.chunk_index) {
                    Err((self.failure)())
                } else {
                    let mut suggestions = vec![RawSuggestion::new("teh", "the")];
                    suggestions.extend(self.extra.iter().cloned());
                    Ok(suggestions)
                }
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ============================================================================
// BEHAVIOR: Successful Runs
// ============================================================================

#[tokio::test]
async fn should_anchor_suggestions_from_every_chunk() -> TestResult {
    // Given: A seven-paragraph document and a service that always answers
    let document = seven_paragraphs();
    let pipeline = CorrectionPipeline::new(ScriptedService::new(), config())?;

    // When: The pipeline runs
    let report = pipeline.run(&document, &CancelToken::new(), None).await?;

    // Then: Every chunk contributes one correction at the right offset
    assert_eq!(report.chunk_count, 7);
    assert!(report.failed_chunks.is_empty());
    let starts: Vec<usize> = report.corrections.iter().map(|c| c.position.start).collect();
    let expected: Vec<usize> = (0..7).map(|i| i * PARAGRAPH_LEN + TYPO_OFFSET).collect();
    assert_eq!(starts, expected);
    assert!(report.corrections.iter().all(|c| c.matches(&document)));
    Ok(())
}

#[tokio::test]
async fn should_respect_concurrency_limit() -> TestResult {
    // Given: A service that records how many calls overlap
    let document = seven_paragraphs();
    let service = ScriptedService::new().with_delay(Duration::from_millis(20));
    let pipeline = CorrectionPipeline::new(service, config())?;

    // When: The pipeline runs with concurrency 3
    pipeline.run(&document, &CancelToken::new(), None).await?;

    // Then: No more than three calls were ever in flight
    let peak = pipeline_service_peak(&pipeline);
    assert!(peak <= 3, "peak concurrency was {peak}");
    Ok(())
}

fn pipeline_service_peak(pipeline: &CorrectionPipeline<ScriptedService>) -> usize {
    pipeline.service().peak.load(Ordering::SeqCst)
}

#[tokio::test]
async fn should_report_progress_for_each_chunk() -> TestResult {
    // Given: A progress callback that records updates
    let document = seven_paragraphs();
    let pipeline = CorrectionPipeline::new(ScriptedService::new(), config())?;
    let seen = Mutex::new(Vec::new());
    let record = |progress: PoolProgress| {
        if let Ok(mut seen) = seen.lock() {
            seen.push(progress.completed);
        }
    };

    // When: The pipeline runs
    pipeline
        .run(&document, &CancelToken::new(), Some(&record))
        .await?;

    // Then: Progress climbs from 1 to 7
    let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
    assert_eq!(seen, (1..=7).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn should_list_unanchorable_suggestions_separately() -> TestResult {
    // Given: A service that also returns text absent from the document
    let document = seven_paragraphs();
    let service = ScriptedService::new().with_extra(RawSuggestion::new("zebra crossing", "x"));
    let pipeline = CorrectionPipeline::new(service, config())?;

    // When: The pipeline runs
    let report = pipeline.run(&document, &CancelToken::new(), None).await?;

    // Then: Anchored corrections are kept and misses are listed per chunk
    assert_eq!(report.corrections.len(), 7);
    assert_eq!(report.unmatched.len(), 7);
    let chunk_indexes: Vec<usize> = report.unmatched.iter().map(|u| u.chunk_index).collect();
    assert_eq!(chunk_indexes, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn should_handle_empty_document() -> TestResult {
    // Given: An empty document
    let pipeline = CorrectionPipeline::new(ScriptedService::new(), config())?;

    // When: The pipeline runs
    let report = pipeline.run("", &CancelToken::new(), None).await?;

    // Then: Nothing is sent and nothing is found
    assert_eq!(report.chunk_count, 0);
    assert!(report.corrections.is_empty());
    assert_eq!(pipeline.service().calls.load(Ordering::SeqCst), 0);
    Ok(())
}

// ============================================================================
// BEHAVIOR: Partial Failure
// ============================================================================

#[tokio::test]
async fn should_keep_other_chunks_when_one_chunk_always_fails() -> TestResult {
    // Given: Seven chunks, concurrency 3, and chunk 4 failing fatally
    let document = seven_paragraphs();
    let pipeline = CorrectionPipeline::new(ScriptedService::new().failing(4), config())?;

    // When: The pipeline runs
    let report = pipeline.run(&document, &CancelToken::new(), None).await?;

    // Then: Six chunks are mapped and exactly one failure is reported
    assert_eq!(report.corrections.len(), 6);
    assert_eq!(report.failed_chunks.len(), 1);
    assert_eq!(report.failed_chunks.first().map(|f| f.index), Some(4));
    assert!(report.is_partial());
    assert!(
        report
            .corrections
            .iter()
            .all(|c| c.position.start != 4 * PARAGRAPH_LEN + TYPO_OFFSET)
    );
    // A fatal error is not retried.
    assert_eq!(pipeline.service().calls.load(Ordering::SeqCst), 7);
    Ok(())
}

#[tokio::test]
async fn should_retry_transient_failures_before_giving_up() -> TestResult {
    // Given: Chunk 2 failing with a server error every time
    let document = seven_paragraphs();
    let service = ScriptedService::new()
        .failing(2)
        .with_failure(|| CompletionError::Status {
            status: 503,
            body: "unavailable".to_string(),
        });
    let pipeline = CorrectionPipeline::new(service, config())?;

    // When: The pipeline runs with two retries allowed
    let report = pipeline.run(&document, &CancelToken::new(), None).await?;

    // Then: The chunk was tried three times and then reported
    assert_eq!(pipeline.service().calls.load(Ordering::SeqCst), 6 + 3);
    assert_eq!(report.failed_chunks.len(), 1);
    assert!(
        report
            .failed_chunks
            .first()
            .is_some_and(|f| f.reason.contains("503"))
    );
    Ok(())
}

// ============================================================================
// BEHAVIOR: Cancellation
// ============================================================================

#[tokio::test]
async fn should_fail_with_cancelled_when_token_fires() -> TestResult {
    // Given: A slow service and a token fired shortly after the run starts
    let document = seven_paragraphs();
    let service = ScriptedService::new().with_delay(Duration::from_millis(500));
    let pipeline = CorrectionPipeline::new(service, config())?;
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    // When: The pipeline runs
    let result = pipeline.run(&document, &cancel, None).await;

    // Then: The run fails with Cancelled and later chunks never start
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(pipeline.service().calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn should_cancel_previous_run_when_a_new_one_begins() -> TestResult {
    // Given: A run in progress under a controller
    let document = seven_paragraphs();
    let service = ScriptedService::new().with_delay(Duration::from_millis(500));
    let pipeline = CorrectionPipeline::new(service, config())?;
    let controller = RunController::new();
    let first = controller.begin();

    // When: A second run begins while the first is pending
    let (first_result, _) = tokio::join!(pipeline.run(&document, &first, None), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.begin()
    });

    // Then: The first run is cancelled
    assert!(matches!(first_result, Err(Error::Cancelled)));
    Ok(())
}
