#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Emend
//!
//! Chunked document correction with anchored, undoable edits.
//!
//! This library re-exports the workspace crates and owns the `emend.toml`
//! configuration used by the binary.

pub mod config;

// Re-export all crates
pub use emend_completion;
pub use emend_core;
pub use emend_diff;
pub use emend_pipeline;
pub use emend_review;

pub use config::{ConfigError, EmendConfig};
