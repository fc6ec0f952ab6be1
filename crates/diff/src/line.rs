//! Line-level diff of whole documents.
//!
//! Lines keep their terminating `\n`, so concatenating the `Equal` and
//! `Insert` lines of a diff reproduces the new text byte for byte.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::lcs::{ChangeKind, EditOp, diff_tokens};
use crate::word::{WordDiff, word_diff};

/// One line of a line diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOp {
    pub kind: ChangeKind,
    /// The line including its `\n`, if it had one.
    pub line: String,
}

impl LineOp {
    fn new(kind: ChangeKind, line: &str) -> Self {
        Self {
            kind,
            line: line.to_string(),
        }
    }
}

/// Split text into lines, each keeping its terminator.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Diff two texts line by line.
#[must_use]
pub fn line_diff(old: &str, new: &str) -> Vec<LineOp> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    diff_tokens(&old_lines, &new_lines)
        .into_iter()
        .map(|op| match op {
            EditOp::Equal { old: i, .. } => LineOp::new(ChangeKind::Equal, old_lines[i]),
            EditOp::Delete { old: i } => LineOp::new(ChangeKind::Delete, old_lines[i]),
            EditOp::Insert { new: j } => LineOp::new(ChangeKind::Insert, new_lines[j]),
        })
        .collect()
}

/// Replay a line diff against `old`.
///
/// Returns `None` when the ops do not describe `old` (an `Equal` or
/// `Delete` line does not match, or old lines are left over).
#[must_use]
pub fn apply_line_ops(old: &str, ops: &[LineOp]) -> Option<String> {
    let mut remaining = split_lines(old).into_iter();
    let mut out = String::with_capacity(old.len());
    for op in ops {
        match op.kind {
            ChangeKind::Equal => {
                if remaining.next()? != op.line {
                    return None;
                }
                out.push_str(&op.line);
            }
            ChangeKind::Delete => {
                if remaining.next()? != op.line {
                    return None;
                }
            }
            ChangeKind::Insert => out.push_str(&op.line),
        }
    }
    remaining.next().is_none().then_some(out)
}

/// Render a line diff with ` `, `-`, and `+` prefixes, one line per op.
#[must_use]
pub fn unified_diff(old: &str, new: &str) -> String {
    let mut out = String::new();
    for op in line_diff(old, new) {
        let prefix = match op.kind {
            ChangeKind::Equal => ' ',
            ChangeKind::Delete => '-',
            ChangeKind::Insert => '+',
        };
        let _ = writeln!(out, "{prefix}{}", op.line.trim_end_matches('\n'));
    }
    out
}

/// Counts of lines per change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub unchanged: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl DiffStats {
    /// Tally a line diff.
    #[must_use]
    pub fn from_ops(ops: &[LineOp]) -> Self {
        ops.iter().fold(Self::default(), |mut stats, op| {
            match op.kind {
                ChangeKind::Equal => stats.unchanged += 1,
                ChangeKind::Delete => stats.deleted += 1,
                ChangeKind::Insert => stats.inserted += 1,
            }
            stats
        })
    }

    /// Whether anything changed.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.deleted > 0 || self.inserted > 0
    }
}

impl std::fmt::Display for DiffStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} unchanged, -{} +{}",
            self.unchanged, self.deleted, self.inserted
        )
    }
}

/// A side-by-side block for review display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiffBlock {
    Equal {
        lines: Vec<String>,
    },
    Delete {
        lines: Vec<String>,
    },
    Insert {
        lines: Vec<String>,
    },
    /// Deleted lines directly followed by inserted lines, with a word diff
    /// of the two runs.
    Replace {
        old: Vec<String>,
        new: Vec<String>,
        words: WordDiff,
    },
}

/// Group a line diff into aligned blocks.
///
/// A run of deletions immediately followed by a run of insertions is paired
/// into one `Replace` block.
#[must_use]
pub fn aligned_blocks(old: &str, new: &str) -> Vec<DiffBlock> {
    let ops = line_diff(old, new);
    let mut blocks = Vec::new();
    let mut pending_delete: Vec<String> = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let mut run_kind: Option<ChangeKind> = None;

    for op in ops {
        if run_kind != Some(op.kind) {
            flush_run(&mut blocks, &mut pending_delete, run_kind, std::mem::take(&mut run));
            run_kind = Some(op.kind);
        }
        run.push(op.line);
    }
    flush_run(&mut blocks, &mut pending_delete, run_kind, run);
    if !pending_delete.is_empty() {
        blocks.push(DiffBlock::Delete {
            lines: pending_delete,
        });
    }
    blocks
}

fn flush_run(
    blocks: &mut Vec<DiffBlock>,
    pending_delete: &mut Vec<String>,
    kind: Option<ChangeKind>,
    lines: Vec<String>,
) {
    if lines.is_empty() {
        return;
    }
    match kind {
        Some(ChangeKind::Delete) => *pending_delete = lines,
        Some(ChangeKind::Insert) if !pending_delete.is_empty() => {
            let old = std::mem::take(pending_delete);
            let words = word_diff(&old.concat(), &lines.concat());
            blocks.push(DiffBlock::Replace {
                old,
                new: lines,
                words,
            });
        }
        Some(ChangeKind::Insert) => blocks.push(DiffBlock::Insert { lines }),
        Some(ChangeKind::Equal) => {
            if !pending_delete.is_empty() {
                blocks.push(DiffBlock::Delete {
                    lines: std::mem::take(pending_delete),
                });
            }
            blocks.push(DiffBlock::Equal { lines });
        }
        None => {}
    }
}
