//! Longest-common-subsequence table and walk shared by the word and line differs.
//!
//! Exact, O(n·m) time and space in token counts after trimming the common
//! prefix and suffix. Callers bound the input size.

use serde::{Deserialize, Serialize};

/// Classification of one token in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present on both sides.
    Equal,
    /// Only in the old text.
    Delete,
    /// Only in the new text.
    Insert,
}

/// One step of an edit script, indexing into the old and new token slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Equal { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

impl EditOp {
    /// The change kind of this step.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Equal { .. } => ChangeKind::Equal,
            Self::Delete { .. } => ChangeKind::Delete,
            Self::Insert { .. } => ChangeKind::Insert,
        }
    }
}

/// Compute an edit script turning `old` into `new`.
///
/// Within a changed region deletions are emitted before insertions, so a
/// replaced run reads as "delete..., insert...".
#[must_use]
pub fn diff_tokens<T: PartialEq>(old: &[T], new: &[T]) -> Vec<EditOp> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();
    let old_rest = old.get(prefix..).unwrap_or_default();
    let new_rest = new.get(prefix..).unwrap_or_default();
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = old_rest
        .get(..old_rest.len().saturating_sub(suffix))
        .unwrap_or_default();
    let new_mid = new_rest
        .get(..new_rest.len().saturating_sub(suffix))
        .unwrap_or_default();

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    ops.extend((0..prefix).map(|i| EditOp::Equal { old: i, new: i }));
    walk_table(old_mid, new_mid, prefix, &mut ops);

    let old_tail = prefix + old_mid.len();
    let new_tail = prefix + new_mid.len();
    ops.extend((0..suffix).map(|k| EditOp::Equal {
        old: old_tail + k,
        new: new_tail + k,
    }));
    ops
}

/// Fill the suffix-LCS table for `old`/`new` and walk it front to back.
fn walk_table<T: PartialEq>(old: &[T], new: &[T], base: usize, ops: &mut Vec<EditOp>) {
    let n = old.len();
    let m = new.len();
    let width = m + 1;
    // table[i * width + j] = LCS length of old[i..] and new[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(EditOp::Equal {
                old: base + i,
                new: base + j,
            });
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            ops.push(EditOp::Delete { old: base + i });
            i += 1;
        } else {
            ops.push(EditOp::Insert { new: base + j });
            j += 1;
        }
    }
    ops.extend((i..n).map(|k| EditOp::Delete { old: base + k }));
    ops.extend((j..m).map(|k| EditOp::Insert { new: base + k }));
}

/// Length of the longest common subsequence.
#[must_use]
pub fn lcs_len<T: PartialEq>(old: &[T], new: &[T]) -> usize {
    diff_tokens(old, new)
        .iter()
        .filter(|op| op.kind() == ChangeKind::Equal)
        .count()
}
