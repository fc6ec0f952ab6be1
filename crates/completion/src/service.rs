//! The completion-service trait and its request type.

use std::sync::Arc;

use async_trait::async_trait;
use emend_core::{CancelToken, Chunk, RawSuggestion};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One chunk's worth of text to analyse, plus read-only surrounding context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    /// Index of the chunk in its run.
    pub chunk_index: usize,
    /// Text suggestions must come from.
    pub text: String,
    /// Text immediately before the chunk.
    #[serde(default)]
    pub context_before: String,
    /// Text immediately after the chunk.
    #[serde(default)]
    pub context_after: String,
}

impl ChunkRequest {
    /// Request with no context.
    pub fn new(chunk_index: usize, text: impl Into<String>) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    /// Set the context windows.
    #[must_use]
    pub fn with_context(
        mut self,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        self.context_before = before.into();
        self.context_after = after.into();
        self
    }

    /// Build a request for `chunk`, taking up to `context_chars` bytes of
    /// context on each side from `source` (trimmed to char boundaries).
    #[must_use]
    pub fn for_chunk(chunk: &Chunk, source: &str, context_chars: usize) -> Self {
        let before_start = ceil_char_boundary(source, chunk.start.saturating_sub(context_chars));
        let after_end = floor_char_boundary(source, chunk.end.saturating_add(context_chars));
        let before = source.get(before_start..chunk.start).unwrap_or_default();
        let after = source.get(chunk.end..after_end).unwrap_or_default();
        Self::new(chunk.index, chunk.text.clone()).with_context(before, after)
    }
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

/// Something that turns chunk text into raw suggestions.
///
/// Implementations must return promptly with `Error::Cancelled` once
/// `cancel` fires.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Ask for suggestions on one chunk.
    async fn suggest(
        &self,
        request: &ChunkRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<RawSuggestion>>;
}

#[async_trait]
impl<S: CompletionService + ?Sized> CompletionService for Arc<S> {
    async fn suggest(
        &self,
        request: &ChunkRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<RawSuggestion>> {
        (**self).suggest(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, source: &str, start: usize, end: usize) -> Chunk {
        Chunk {
            index,
            text: source[start..end].to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_for_chunk_takes_context_on_both_sides() {
        let source = "aaaa|bbbb|cccc";
        let request = ChunkRequest::for_chunk(&chunk(1, source, 5, 9), source, 3);
        assert_eq!(request.text, "bbbb");
        assert_eq!(request.context_before, "aa|");
        assert_eq!(request.context_after, "|cc");
        assert_eq!(request.chunk_index, 1);
    }

    #[test]
    fn test_for_chunk_clamps_at_document_edges() {
        let source = "abc";
        let request = ChunkRequest::for_chunk(&chunk(0, source, 0, 3), source, 50);
        assert!(request.context_before.is_empty());
        assert!(request.context_after.is_empty());
    }

    #[test]
    fn test_for_chunk_respects_char_boundaries() {
        // "é" is two bytes; a 1-byte window must not split it.
        let source = "éxyé";
        let request = ChunkRequest::for_chunk(&chunk(0, source, 2, 4), source, 1);
        assert_eq!(request.text, "xy");
        assert_eq!(request.context_before, "");
        assert_eq!(request.context_after, "");
    }
}
