#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # emend-pipeline
//!
//! Chunked correction pipeline for long documents.
//!
//! This crate provides:
//! - Structure-aware chunking of LaTeX-style documents
//! - A bounded-concurrency worker pool with cooperative cancellation
//! - Retry with exponential backoff, jitter, and retry-after hints
//! - Anchoring of service suggestions onto exact document offsets
//! - Overlap filtering of the merged correction list
//!
//! # Design Principles
//!
//! - **No panics**: `unwrap()`, `expect()`, and `panic!()` are forbidden
//! - **Partial results**: a failed chunk is reported, not fatal
//! - **Explicit cancellation**: one token is threaded through every await

pub mod anchor;
pub mod chunker;
pub mod error;
pub mod overlap;
pub mod pool;
pub mod retry;
pub mod runner;

// Re-export commonly used items
pub use anchor::{AnchorConfig, AnchorResolver, resolve_anchors};
pub use chunker::{ChunkerConfig, DEFAULT_MAX_CHUNK_SIZE, split};
pub use error::{Error, Result};
pub use overlap::{DropReason, DroppedCorrection, OverlapOutcome, filter_overlaps};
pub use pool::{PoolError, PoolOptions, PoolProgress, ProgressFn, run_pool};
pub use retry::{RetryConfig, Retryable, retry_with_backoff};
pub use runner::{
    ChunkFailure, CorrectionPipeline, PipelineConfig, PipelineReport, RunController, RunSummary,
    UnmatchedSuggestion,
};
