#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

//! Emend Diff - exact LCS diffs for reviewing corrections.
//!
//! - [`word_diff`] renders one correction, highlighting changed words
//!   while leaving whitespace unmarked.
//! - [`line_diff`], [`unified_diff`], and [`aligned_blocks`] compare whole
//!   documents.
//!
//! Both levels share one LCS table ([`lcs::diff_tokens`]), which is exact
//! and quadratic in token count.

pub mod lcs;
pub mod line;
pub mod word;

pub use lcs::{ChangeKind, EditOp, diff_tokens, lcs_len};
pub use line::{
    DiffBlock, DiffStats, LineOp, aligned_blocks, apply_line_ops, line_diff, split_lines,
    unified_diff,
};
pub use word::{Segment, WordDiff, tokenize_words, word_diff};
