//! Data model shared by the chunker, the anchor resolver, and the review session.
//!
//! Offsets are UTF-8 byte offsets into the text they were taken from and
//! always fall on char boundaries.

use serde::{Deserialize, Deserializer, Serialize};

/// Half-open byte range `[start, end)` in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes (zero for degenerate spans).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// A span is empty when `start >= end`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the two spans share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Translate a chunk-local span into document coordinates.
    #[must_use]
    pub const fn offset_by(self, base: usize) -> Self {
        Self {
            start: self.start.saturating_add(base),
            end: self.end.saturating_add(base),
        }
    }

    /// Shift both ends by a signed delta, `None` on overflow.
    #[must_use]
    pub const fn shifted(self, delta: isize) -> Option<Self> {
        let Some(start) = self.start.checked_add_signed(delta) else {
            return None;
        };
        let Some(end) = self.end.checked_add_signed(delta) else {
            return None;
        };
        Some(Self { start, end })
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A contiguous, offset-tagged slice of the analysis text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the run (0-based).
    pub index: usize,
    /// The chunk text, equal to `analysis_text[start..end]`.
    pub text: String,
    /// Start offset in the analysis text.
    pub start: usize,
    /// End offset in the analysis text.
    pub end: usize,
}

impl Chunk {
    /// Byte range covered by this chunk.
    #[must_use]
    pub const fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Chunk length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Chunks produced by the chunker are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// What a correction asks the reviewer to do.
///
/// `Comment` entries annotate text without changing it, so their
/// `corrected` text always equals `original`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    #[default]
    Grammar,
    Style,
    Comment,
}

impl CorrectionKind {
    /// Parse a service-provided type label. Unknown labels map to `Grammar`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "style" => Self::Style,
            "comment" => Self::Comment,
            _ => Self::Grammar,
        }
    }

    /// String representation (matches serialization format).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Style => "style",
            Self::Comment => "comment",
        }
    }
}

impl<'de> Deserialize<'de> for CorrectionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

impl std::fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suggestion as returned by the completion service, not yet anchored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSuggestion {
    /// Text the service claims appears in the chunk.
    pub original: String,
    /// Replacement text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub corrected: String,
    /// Free-form rationale shown to the reviewer.
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    /// Suggestion category.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: CorrectionKind,
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl RawSuggestion {
    /// Create a grammar suggestion.
    pub fn new(original: impl Into<String>, corrected: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            corrected: corrected.into(),
            explanation: String::new(),
            kind: CorrectionKind::Grammar,
        }
    }

    /// Set the suggestion kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: CorrectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the explanation.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Only suggestions with a non-empty `original` can be anchored.
    #[must_use]
    pub fn is_anchorable(&self) -> bool {
        !self.original.is_empty()
    }
}

/// A suggestion anchored to exact document offsets.
///
/// At mapping time `document[position.start..position.end] == original`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Document text covered by `position`.
    pub original: String,
    /// Replacement text (equal to `original` for comments).
    pub corrected: String,
    /// Rationale from the service.
    #[serde(default)]
    pub explanation: String,
    /// Correction category.
    #[serde(rename = "type", default)]
    pub kind: CorrectionKind,
    /// Location in document coordinates.
    pub position: Span,
    /// Whether the anchor came from the edit-distance search.
    #[serde(default)]
    pub fuzzy: bool,
    /// What the service claimed the text was, when it differed from the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_original: Option<String>,
}

impl Correction {
    /// Anchor a suggestion whose `original` matched the text exactly.
    #[must_use]
    pub fn exact(suggestion: &RawSuggestion, position: Span) -> Self {
        Self {
            original: suggestion.original.clone(),
            corrected: suggestion.corrected.clone(),
            explanation: suggestion.explanation.clone(),
            kind: suggestion.kind,
            position,
            fuzzy: false,
            reported_original: None,
        }
        .normalized()
    }

    /// Anchor a suggestion to text that is within edit distance of its `original`.
    ///
    /// `actual` is the document text at `position`; it becomes the correction's
    /// `original` so the anchor stays sound.
    #[must_use]
    pub fn fuzzy(suggestion: &RawSuggestion, position: Span, actual: &str) -> Self {
        Self {
            original: actual.to_string(),
            corrected: suggestion.corrected.clone(),
            explanation: suggestion.explanation.clone(),
            kind: suggestion.kind,
            position,
            fuzzy: true,
            reported_original: Some(suggestion.original.clone()),
        }
        .normalized()
    }

    /// Enforce the comment invariant (`corrected == original`).
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.kind == CorrectionKind::Comment && self.corrected != self.original {
            self.corrected.clone_from(&self.original);
        }
        self
    }

    /// Whether `document` still holds `original` at `position`.
    #[must_use]
    pub fn matches(&self, document: &str) -> bool {
        document.get(self.position.start..self.position.end) == Some(self.original.as_str())
    }

    /// Whether accepting this correction leaves the text unchanged.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.kind == CorrectionKind::Comment
    }

    /// The raw suggestion this correction was anchored from.
    #[must_use]
    pub fn to_suggestion(&self) -> RawSuggestion {
        RawSuggestion {
            original: self
                .reported_original
                .clone()
                .unwrap_or_else(|| self.original.clone()),
            corrected: self.corrected.clone(),
            explanation: self.explanation.clone(),
            kind: self.kind,
        }
    }
}

/// Outcome of anchoring one chunk's suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Anchored corrections, sorted by `position.start`.
    pub mapped: Vec<Correction>,
    /// Suggestions that could not be located.
    pub unmatched: Vec<RawSuggestion>,
    /// Suggestions discarded because they repeated an already mapped span.
    #[serde(default)]
    pub duplicates: usize,
}

impl MatchResult {
    /// Fold another chunk's result into this one. `mapped` is re-sorted.
    pub fn merge(&mut self, other: Self) {
        self.mapped.extend(other.mapped);
        self.mapped.sort_by_key(|c| c.position.start);
        self.unmatched.extend(other.unmatched);
        self.duplicates = self.duplicates.saturating_add(other.duplicates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_shifted_handles_negative_delta() {
        assert_eq!(Span::new(5, 9).shifted(-5), Some(Span::new(0, 4)));
        assert_eq!(Span::new(5, 9).shifted(-6), None);
    }

    #[test]
    fn test_span_overlap_is_half_open() {
        assert!(!Span::new(0, 3).overlaps(&Span::new(3, 5)));
        assert!(Span::new(0, 4).overlaps(&Span::new(3, 5)));
    }

    #[test]
    fn test_unknown_kind_label_is_grammar() -> Result<(), serde_json::Error> {
        let raw: RawSuggestion =
            serde_json::from_str(r#"{"original":"a","corrected":"b","type":"spelling"}"#)?;
        assert_eq!(raw.kind, CorrectionKind::Grammar);
        Ok(())
    }

    #[test]
    fn test_null_fields_take_defaults() -> Result<(), serde_json::Error> {
        let raw: RawSuggestion = serde_json::from_str(
            r#"{"original":"a","corrected":"b","explanation":null,"type":null}"#,
        )?;
        assert_eq!(raw.explanation, "");
        assert_eq!(raw.kind, CorrectionKind::Grammar);
        assert_eq!(raw.corrected, "b");
        Ok(())
    }

    #[test]
    fn test_kind_serializes_lowercase() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&CorrectionKind::Style)?;
        assert_eq!(json, "\"style\"");
        Ok(())
    }

    #[test]
    fn test_comment_correction_keeps_original_text() {
        let raw = RawSuggestion::new("colour", "color").with_kind(CorrectionKind::Comment);
        let correction = Correction::exact(&raw, Span::new(0, 6));
        assert_eq!(correction.corrected, "colour");
    }

    #[test]
    fn test_fuzzy_correction_adopts_document_text() {
        let raw = RawSuggestion::new("recieve", "receive");
        let correction = Correction::fuzzy(&raw, Span::new(4, 10), "receve");
        assert_eq!(correction.original, "receve");
        assert_eq!(correction.reported_original.as_deref(), Some("recieve"));
        assert!(correction.fuzzy);
        assert_eq!(correction.to_suggestion().original, "recieve");
    }

    #[test]
    fn test_correction_matches_document() {
        let raw = RawSuggestion::new("Teh", "The");
        let correction = Correction::exact(&raw, Span::new(0, 3));
        assert!(correction.matches("Teh cat sat."));
        assert!(!correction.matches("The cat sat."));
    }
}
