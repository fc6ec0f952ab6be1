//! Lenient parsing of completion-service response bodies.
//!
//! Services wrap their JSON in Markdown fences, precede it with prose, or
//! nest the array under a key. A body that cannot be understood is treated
//! as "no suggestions" rather than as a failure.

use emend_core::{CorrectionKind, RawSuggestion};
use serde_json::Value;
use tracing::{debug, warn};

/// Keys under which an object-shaped response may carry its suggestions.
const LIST_KEYS: [&str; 2] = ["corrections", "suggestions"];

/// Extract raw suggestions from a response body.
///
/// Entries without a string `original` are skipped, as are edits without a
/// string `corrected`; only comments may omit it. Entries with an empty
/// `original` are kept so the anchor resolver can report them unmatched.
#[must_use]
pub fn parse_suggestions(body: &str) -> Vec<RawSuggestion> {
    let Some(value) = extract_json(body) else {
        if !body.trim().is_empty() {
            warn!(body_len = body.len(), "Completion response contained no JSON");
        }
        return Vec::new();
    };

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => {
            let list = LIST_KEYS
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(entries)) => Some(entries),
                    _ => None,
                });
            let Some(entries) = list else {
                warn!("Completion response object has no suggestion list");
                return Vec::new();
            };
            entries
        }
        _ => {
            warn!("Completion response is not a list of suggestions");
            return Vec::new();
        }
    };

    let total = entries.len();
    let suggestions: Vec<RawSuggestion> = entries
        .into_iter()
        .filter(|entry| entry.get("original").is_some_and(Value::is_string))
        .filter(has_replacement)
        .filter_map(|entry| match serde_json::from_value::<RawSuggestion>(entry) {
            Ok(suggestion) => Some(suggestion),
            Err(e) => {
                debug!(error = %e, "Skipping malformed suggestion entry");
                None
            }
        })
        .collect();

    if suggestions.len() < total {
        debug!(
            kept = suggestions.len(),
            skipped = total - suggestions.len(),
            "Dropped suggestion entries without a usable original or replacement"
        );
    }
    suggestions
}

/// Whether an entry can be applied: it carries `corrected` text or is a comment.
fn has_replacement(entry: &Value) -> bool {
    entry.get("corrected").is_some_and(Value::is_string)
        || entry
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|label| CorrectionKind::from_label(label) == CorrectionKind::Comment)
}

/// Find the first parseable JSON value in `body`.
fn extract_json(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    [
        fenced_block(trimmed),
        Some(trimmed),
        delimited(trimmed, '[', ']'),
        delimited(trimmed, '{', '}'),
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

/// Contents of the first ```` ``` ```` fenced block, without its info string.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open + 3..)?;
    let body_start = after_fence.find('\n')? + 1;
    let body = after_fence.get(body_start..)?;
    let close = body.find("```")?;
    body.get(..close).map(str::trim)
}

/// Slice from the first `open` to the last `close`, inclusive.
fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| text.get(start..=end)).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array() {
        let body = r#"[{"original":"Teh","corrected":"The","explanation":"typo","type":"grammar"}]"#;
        let parsed = parse_suggestions(body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.first().map(|s| s.original.as_str()), Some("Teh"));
        assert_eq!(parsed.first().map(|s| s.kind), Some(CorrectionKind::Grammar));
    }

    #[test]
    fn test_code_fence_with_prose() {
        let body = "Here are the fixes:\n```json\n[{\"original\":\"a\",\"corrected\":\"b\",\"type\":\"style\"}]\n```\nHope that helps.";
        let parsed = parse_suggestions(body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.first().map(|s| s.kind), Some(CorrectionKind::Style));
    }

    #[test]
    fn test_prose_around_array() {
        let body = "Sure! [{\"original\":\"x\",\"corrected\":\"y\"}] Done.";
        assert_eq!(parse_suggestions(body).len(), 1);
    }

    #[test]
    fn test_object_with_corrections_key() {
        let body = r#"{"corrections":[{"original":"x","corrected":"y"},{"original":"p","corrected":"q"}]}"#;
        assert_eq!(parse_suggestions(body).len(), 2);
    }

    #[test]
    fn test_object_with_suggestions_key() {
        let body = r#"{"suggestions":[{"original":"x","corrected":"y"}]}"#;
        assert_eq!(parse_suggestions(body).len(), 1);
    }

    #[test]
    fn test_entries_without_original_are_skipped() {
        let body = r#"[{"corrected":"y"},{"original":42},{"original":"","corrected":"z"},{"original":"ok","corrected":"fine"}]"#;
        let parsed = parse_suggestions(body);
        let originals: Vec<&str> = parsed.iter().map(|s| s.original.as_str()).collect();
        assert_eq!(originals, vec!["", "ok"]);
    }

    #[test]
    fn test_edits_without_corrected_are_skipped() {
        let body = r#"[
            {"original":"Teh"},
            {"original":"Teh","corrected":null},
            {"original":"vague para","type":"comment","explanation":"expand"},
            {"original":"cat","corrected":"dog","explanation":null,"type":null}
        ]"#;
        let parsed = parse_suggestions(body);
        let originals: Vec<&str> = parsed.iter().map(|s| s.original.as_str()).collect();
        assert_eq!(originals, vec!["vague para", "cat"]);
        assert_eq!(parsed.last().map(|s| s.kind), Some(CorrectionKind::Grammar));
    }

    #[test]
    fn test_corrupt_body_yields_nothing() {
        assert!(parse_suggestions("[{\"original\": \"unterminated").is_empty());
        assert!(parse_suggestions("no json here").is_empty());
        assert!(parse_suggestions("").is_empty());
        assert!(parse_suggestions(r#"{"note":"nothing"}"#).is_empty());
    }

    #[test]
    fn test_comment_kind_is_kept() {
        let body = r#"[{"original":"para","corrected":"para","type":"comment","explanation":"vague"}]"#;
        let parsed = parse_suggestions(body);
        assert_eq!(parsed.first().map(|s| s.kind), Some(CorrectionKind::Comment));
        assert_eq!(parsed.first().map(|s| s.explanation.as_str()), Some("vague"));
    }
}
