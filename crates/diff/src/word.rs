//! Word-level diff for rendering a single correction.

use serde::{Deserialize, Serialize};

use crate::lcs::{ChangeKind, EditOp, diff_tokens};

/// A run of text with one change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: ChangeKind,
    pub text: String,
}

impl Segment {
    fn new(kind: ChangeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Both sides of a word diff, ready to render.
///
/// Concatenating the segment texts of `original` gives back the old text,
/// and likewise for `corrected`. Whitespace is always `Equal`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDiff {
    /// Old text; changed words are `Delete`.
    pub original: Vec<Segment>,
    /// New text; changed words are `Insert`.
    pub corrected: Vec<Segment>,
}

impl WordDiff {
    /// True when no word was added or removed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.original
            .iter()
            .chain(&self.corrected)
            .all(|s| s.kind == ChangeKind::Equal)
    }

    /// Rebuild the old text.
    #[must_use]
    pub fn original_text(&self) -> String {
        self.original.iter().map(|s| s.text.as_str()).collect()
    }

    /// Rebuild the new text.
    #[must_use]
    pub fn corrected_text(&self) -> String {
        self.corrected.iter().map(|s| s.text.as_str()).collect()
    }

    /// Render as inline markup: `[-old-]{+new+}`.
    #[must_use]
    pub fn to_inline(&self) -> String {
        let old_text = self.original_text();
        let new_text = self.corrected_text();
        let old = tokenize_words(&old_text);
        let new = tokenize_words(&new_text);
        let mut ops = diff_tokens(&old, &new).into_iter().peekable();

        let mut out = String::new();
        while let Some(op) = ops.next() {
            match op {
                EditOp::Equal { old: i, .. } => out.push_str(old.get(i).copied().unwrap_or("")),
                EditOp::Delete { old: i } => {
                    out.push_str("[-");
                    out.push_str(old.get(i).copied().unwrap_or(""));
                    while let Some(EditOp::Delete { old: k }) = ops.peek().copied() {
                        out.push_str(old.get(k).copied().unwrap_or(""));
                        ops.next();
                    }
                    out.push_str("-]");
                }
                EditOp::Insert { new: j } => {
                    out.push_str("{+");
                    out.push_str(new.get(j).copied().unwrap_or(""));
                    while let Some(EditOp::Insert { new: k }) = ops.peek().copied() {
                        out.push_str(new.get(k).copied().unwrap_or(""));
                        ops.next();
                    }
                    out.push_str("+}");
                }
            }
        }
        out
    }
}

/// Split text into maximal runs of whitespace and non-whitespace.
///
/// Concatenating the tokens gives back the input.
#[must_use]
pub fn tokenize_words(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            tokens.push(&text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

fn is_whitespace_token(token: &str) -> bool {
    token.chars().all(char::is_whitespace)
}

fn push_merged(side: &mut Vec<Segment>, kind: ChangeKind, text: &str) {
    match side.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(text),
        _ => side.push(Segment::new(kind, text)),
    }
}

/// Diff two strings word by word.
///
/// Whitespace tokens are never highlighted; adjacent segments of the same
/// kind are merged.
#[must_use]
pub fn word_diff(original: &str, corrected: &str) -> WordDiff {
    let old = tokenize_words(original);
    let new = tokenize_words(corrected);
    let mut diff = WordDiff::default();

    for op in diff_tokens(&old, &new) {
        match op {
            EditOp::Equal { old: i, new: j } => {
                push_merged(&mut diff.original, ChangeKind::Equal, old[i]);
                push_merged(&mut diff.corrected, ChangeKind::Equal, new[j]);
            }
            EditOp::Delete { old: i } => {
                let kind = if is_whitespace_token(old[i]) {
                    ChangeKind::Equal
                } else {
                    ChangeKind::Delete
                };
                push_merged(&mut diff.original, kind, old[i]);
            }
            EditOp::Insert { new: j } => {
                let kind = if is_whitespace_token(new[j]) {
                    ChangeKind::Equal
                } else {
                    ChangeKind::Insert
                };
                push_merged(&mut diff.corrected, kind, new[j]);
            }
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_preserves_text() {
        let text = "  a  quick\tbrown\n fox ";
        let tokens = tokenize_words(text);
        assert_eq!(tokens.concat(), text);
        assert_eq!(tokens.first().copied(), Some("  "));
        assert_eq!(tokens.get(1).copied(), Some("a"));
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize_words("").is_empty());
    }

    #[test]
    fn test_single_word_replacement() {
        let diff = word_diff("Teh cat sat", "The cat sat");
        assert_eq!(
            diff.original.first(),
            Some(&Segment::new(ChangeKind::Delete, "Teh"))
        );
        assert_eq!(
            diff.corrected.first(),
            Some(&Segment::new(ChangeKind::Insert, "The"))
        );
        assert_eq!(
            diff.original.get(1),
            Some(&Segment::new(ChangeKind::Equal, " cat sat"))
        );
        assert_eq!(diff.original_text(), "Teh cat sat");
        assert_eq!(diff.corrected_text(), "The cat sat");
    }

    #[test]
    fn test_whitespace_change_is_not_highlighted() {
        let diff = word_diff("a b", "a  b");
        assert!(diff.is_unchanged());
        assert_eq!(diff.corrected_text(), "a  b");
    }

    #[test]
    fn test_identical_strings_are_unchanged() {
        let diff = word_diff("same text", "same text");
        assert!(diff.is_unchanged());
        assert_eq!(diff.original.len(), 1);
    }

    #[test]
    fn test_inline_rendering() {
        let diff = word_diff("we was here", "we were here");
        assert_eq!(diff.to_inline(), "we [-was-]{+were+} here");
    }

    #[test]
    fn test_multibyte_words() {
        let diff = word_diff("café noir", "café crème");
        assert_eq!(
            diff.corrected.last(),
            Some(&Segment::new(ChangeKind::Insert, "crème"))
        );
    }
}
