//! Bounded edit-distance search.

use std::ops::Range;

use emend_core::Span;

/// A fuzzy hit, in byte offsets of the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatch {
    pub span: Span,
    pub distance: usize,
}

/// Compute Levenshtein edit distance.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev_row: Vec<usize> = (0..=n).collect();
    let mut curr_row: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr_row[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[n]
}

/// Edit distance if it is within `budget`. Strings whose lengths differ by
/// more than `budget` are rejected without scoring.
#[must_use]
pub fn distance_within(a: &str, b: &str, budget: usize) -> Option<usize> {
    if a.chars().count().abs_diff(b.chars().count()) > budget {
        return None;
    }
    let distance = levenshtein(a, b);
    (distance <= budget).then_some(distance)
}

/// Distance from `target` to every prefix of `window` (index `k` is the
/// prefix of `k` chars). `None` as soon as a whole row exceeds `budget`.
fn prefix_distances(target: &[char], window: &[char], budget: usize) -> Option<Vec<usize>> {
    let n = window.len();
    let mut prev_row: Vec<usize> = vec![0; n + 1];
    let mut curr_row: Vec<usize> = vec![0; n + 1];
    for (j, cell) in prev_row.iter_mut().enumerate() {
        *cell = j;
    }

    for (i, &tc) in target.iter().enumerate() {
        curr_row[0] = i + 1;
        for j in 1..=n {
            let cost = usize::from(tc != window[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        if curr_row.iter().all(|&d| d > budget) {
            return None;
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }
    Some(prev_row)
}

/// Ranking key: lower is better. Distance first, then edge penalty, then
/// position, then length gap.
type Rank = (usize, usize, usize, usize);

/// Penalise candidates that gain whitespace edges the target lacks or that
/// cut through a word.
fn edge_penalty(target: &[char], chars: &[char], start: usize, len: usize) -> usize {
    let ws = |c: Option<&char>| c.is_some_and(|c| c.is_whitespace());
    let word = |c: Option<&char>| c.is_some_and(|c| c.is_alphanumeric());
    let first = chars.get(start);
    let last = chars.get(start + len - 1);
    let before = start.checked_sub(1).and_then(|i| chars.get(i));
    let after = chars.get(start + len);

    usize::from(ws(first) && !ws(target.first()))
        + usize::from(ws(last) && !ws(target.last()))
        + usize::from(word(before) && word(first))
        + usize::from(word(after) && word(last))
}

/// Find the closest substring of `text[range]` to `target` within `budget`
/// edits, skipping candidates for which `is_free` returns false.
///
/// Only candidates whose char length is within `budget` of the target's are
/// scored. Ties go to the earliest start.
pub fn find_fuzzy(
    text: &str,
    target: &str,
    range: Range<usize>,
    budget: usize,
    is_free: impl Fn(Span) -> bool,
) -> Option<FuzzyMatch> {
    let target_chars: Vec<char> = target.chars().collect();
    let m = target_chars.len();
    if m == 0 {
        return None;
    }

    let start = ceil_char_boundary(text, range.start);
    let end = floor_char_boundary(text, range.end);
    let region = text.get(start..end)?;
    let offsets: Vec<usize> = region.char_indices().map(|(o, _)| start + o).collect();
    let chars: Vec<char> = region.chars().collect();
    let n = chars.len();
    let byte_at = |index: usize| offsets.get(index).copied().unwrap_or(end);

    let min_len = m.saturating_sub(budget).max(1);
    let max_len = m + budget;
    let mut best: Option<(Rank, FuzzyMatch)> = None;

    for s in 0..n {
        let window_end = (s + max_len).min(n);
        if window_end - s < min_len {
            break;
        }
        let window = &chars[s..window_end];
        let Some(row) = prefix_distances(&target_chars, window, budget) else {
            continue;
        };
        for k in min_len..=window.len() {
            let distance = row[k];
            if distance > budget {
                continue;
            }
            let span = Span::new(byte_at(s), byte_at(s + k));
            if !is_free(span) {
                continue;
            }
            let rank = (
                distance,
                edge_penalty(&target_chars, &chars, s, k),
                s,
                k.abs_diff(m),
            );
            if best.as_ref().is_none_or(|(current, _)| rank < *current) {
                best = Some((rank, FuzzyMatch { span, distance }));
            }
        }
    }

    best.map(|(_, hit)| hit)
}

pub(crate) fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub(crate) fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
