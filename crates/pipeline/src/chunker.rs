//! Boundary-aware document chunking.
//!
//! Splits text into ordered, contiguous, non-empty chunks of at most
//! `max_chunk_size` bytes plus a small overshoot, preferring LaTeX
//! structural boundaries over arbitrary whitespace.
//!
//! Split priority, searched in `[target_end - min_split_window, target_end + overshoot]`:
//! 1. `\section{`
//! 2. `\subsection{`
//! 3. `\paragraph{`
//! 4. a blank line directly before `\begin{`
//! 5. `\begin{` at a line start
//! 6. the end of a line holding `\end{..}`
//! 7. any blank line
//!
//! then the last unescaped whitespace near `target_end`, then a hard split.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use emend_core::Chunk;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default maximum chunk size in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8000;

/// Each pattern has one empty capture group marking the split position.
static BOUNDARY_PATTERNS: LazyLock<[(&str, Regex); 7]> = LazyLock::new(|| {
    [
        ("section", r"\n()\\section\*?\{"),
        ("subsection", r"\n()\\subsection\*?\{"),
        ("paragraph", r"\n()\\paragraph\*?\{"),
        ("blank_before_begin", r"\n[ \t]*\n()\\begin\{"),
        ("begin", r"\n()\\begin\{"),
        ("end_line", r"\\end\{[^}\n]*\}[^\n]*\n()"),
        ("blank_line", r"\n[ \t]*\n()"),
    ]
    .map(|(name, pattern)| {
        (
            name,
            Regex::new(pattern).expect("valid boundary regex (verified by tests)"),
        )
    })
});

/// Chunk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target maximum chunk size in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Override for the backward search distance from the target end.
    #[serde(default)]
    pub min_split_window: Option<usize>,
    /// Upper bound on how far past the target end a boundary may lie.
    #[serde(default)]
    pub overshoot_cap: Option<usize>,
    /// Override for the whitespace fallback window.
    #[serde(default)]
    pub whitespace_window: Option<usize>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::with_max_chunk_size(DEFAULT_MAX_CHUNK_SIZE)
    }
}

const fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

impl ChunkerConfig {
    /// Config with the given maximum and derived windows.
    #[must_use]
    pub const fn with_max_chunk_size(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size,
            min_split_window: None,
            overshoot_cap: None,
            whitespace_window: None,
        }
    }

    /// `min(max_chunk_size / 2, 2000)` unless overridden. Never more than half
    /// the chunk size.
    #[must_use]
    pub fn min_split_window(&self) -> usize {
        let half = self.max_chunk_size / 2;
        self.min_split_window.unwrap_or(2000).min(half)
    }

    /// `min(max_chunk_size / 10, 300)`.
    #[must_use]
    pub fn overshoot(&self) -> usize {
        self.overshoot_cap.unwrap_or(300).min(self.max_chunk_size / 10)
    }

    /// `min(max_chunk_size / 4, 200)` unless overridden.
    #[must_use]
    pub fn whitespace_window(&self) -> usize {
        self.whitespace_window
            .unwrap_or(200)
            .min(self.max_chunk_size / 4)
    }

    /// Reject a zero chunk size.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when `max_chunk_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(Error::invalid_config("max_chunk_size must be greater than zero"));
        }
        Ok(())
    }
}

/// Split `text` into chunks.
///
/// Empty text yields no chunks; text no longer than `max_chunk_size` yields
/// one chunk covering all of it.
///
/// # Errors
/// Returns `InvalidConfig` for a zero `max_chunk_size`.
pub fn split(text: &str, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    let len = text.len();
    let mut chunks = Vec::with_capacity(len / config.max_chunk_size + 1);
    let mut pos = 0;

    while pos < len {
        let target_end = pos.saturating_add(config.max_chunk_size).min(len);
        let end = if target_end >= len {
            len
        } else {
            find_split(text, pos, target_end, config)
        };
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[pos..end].to_string(),
            start: pos,
            end,
        });
        pos = end;
    }

    debug!(
        text_len = len,
        chunks = chunks.len(),
        max_chunk_size = config.max_chunk_size,
        "Split text into chunks"
    );
    Ok(chunks)
}

/// Choose the end of the chunk starting at `pos`. Always `> pos`.
fn find_split(text: &str, pos: usize, target_end: usize, config: &ChunkerConfig) -> usize {
    let lower = target_end
        .saturating_sub(config.min_split_window())
        .max(pos + 1);
    let upper = target_end.saturating_add(config.overshoot()).min(text.len());

    if let Some((marker, split)) = structural_split(text, lower, upper) {
        debug!(pos, split, marker, "Structural chunk boundary");
        return split;
    }

    let ws_lower = target_end
        .saturating_sub(config.whitespace_window())
        .max(lower);
    if let Some(split) = whitespace_split(text, ws_lower, target_end) {
        return split;
    }

    let hard = floor_char_boundary(text, target_end);
    if hard > pos {
        hard
    } else {
        ceil_char_boundary(text, pos + 1)
    }
}

/// Latest split position in `[lower, upper]` for the highest-priority marker.
fn structural_split(text: &str, lower: usize, upper: usize) -> Option<(&'static str, usize)> {
    // Start one byte early so a marker whose newline sits just before `lower` is seen.
    let search_start = floor_char_boundary(text, lower.saturating_sub(1));
    let search_end = floor_char_boundary(text, upper);
    let window = text.get(search_start..search_end)?;

    BOUNDARY_PATTERNS.iter().find_map(|(name, pattern)| {
        pattern
            .captures_iter(window)
            .filter_map(|caps| caps.get(1))
            .map(|split| search_start + split.start())
            .filter(|split| (lower..=upper).contains(split))
            .last()
            .map(|split| (*name, split))
    })
}

/// Position just after the last whitespace char in `[lower, upper)` that is
/// not escaped by a preceding backslash.
fn whitespace_split(text: &str, lower: usize, upper: usize) -> Option<usize> {
    let start = ceil_char_boundary(text, lower);
    let end = floor_char_boundary(text, upper);
    let window = text.get(start..end)?;
    let mut prev: Option<char> = text.get(..start).and_then(|head| head.chars().next_back());
    let mut best = None;
    for (offset, ch) in window.char_indices() {
        if ch.is_whitespace() && prev != Some('\\') {
            best = Some(start + offset + ch.len_utf8());
        }
        prev = Some(ch);
    }
    best
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
