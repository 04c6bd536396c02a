//! Three-way content reconciliation
//!
//! Reconciles two divergent descendants of a common base: changes made on
//! only one side apply cleanly; both sides making the identical change
//! collapses to one; overlapping edits with different replacements are
//! conflicts, reported as base line ranges rather than resolved by
//! preferring either side.

use crate::diff::LineRange;
use crate::diff::myers::{Edit, edit_script};

/// Result of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Both sides reconciled; the combined content
    Merged(String),
    /// Overlapping edits, in base line coordinates
    Conflicts(Vec<LineRange>),
}

/// A side's edit to the base: replace base lines `[base_start, base_end)`
/// with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk<'s> {
    base_start: usize,
    base_end: usize,
    replacement: Vec<&'s str>,
}

/// Merge `ours` and `theirs`, both derived from `base`
pub fn three_way_merge(base: &str, ours: &str, theirs: &str) -> MergeOutcome {
    let base_lines: Vec<&str> = base.split_inclusive('\n').collect();
    let our_lines: Vec<&str> = ours.split_inclusive('\n').collect();
    let their_lines: Vec<&str> = theirs.split_inclusive('\n').collect();

    let our_hunks = hunks(&base_lines, &our_lines);
    let their_hunks = hunks(&base_lines, &their_lines);

    let mut merged: Vec<&str> = Vec::new();
    let mut conflicts: Vec<LineRange> = Vec::new();
    let mut base_pos = 0usize;
    let (mut i, mut j) = (0usize, 0usize);

    loop {
        match (our_hunks.get(i), their_hunks.get(j)) {
            (Some(a), Some(b)) if overlaps(a, b) => {
                // cluster every hunk that keeps overlapping the region
                let start = a.base_start.min(b.base_start);
                let mut end = a.base_end.max(b.base_end);
                let (cluster_i, cluster_j) = (i, j);
                i += 1;
                j += 1;
                loop {
                    if let Some(h) = our_hunks.get(i)
                        && h.base_start < end
                    {
                        end = end.max(h.base_end);
                        i += 1;
                        continue;
                    }
                    if let Some(h) = their_hunks.get(j)
                        && h.base_start < end
                    {
                        end = end.max(h.base_end);
                        j += 1;
                        continue;
                    }
                    break;
                }

                let same_change = i == cluster_i + 1
                    && j == cluster_j + 1
                    && our_hunks[cluster_i] == their_hunks[cluster_j];
                if same_change {
                    merged.extend(&base_lines[base_pos..start]);
                    merged.extend(&our_hunks[cluster_i].replacement);
                } else {
                    conflicts.push(LineRange::new(start, end));
                }
                base_pos = end;
            }
            (Some(a), Some(b)) => {
                if a.base_start <= b.base_start {
                    apply(&mut merged, &base_lines, &mut base_pos, a);
                    i += 1;
                } else {
                    apply(&mut merged, &base_lines, &mut base_pos, b);
                    j += 1;
                }
            }
            (Some(a), None) => {
                apply(&mut merged, &base_lines, &mut base_pos, a);
                i += 1;
            }
            (None, Some(b)) => {
                apply(&mut merged, &base_lines, &mut base_pos, b);
                j += 1;
            }
            (None, None) => break,
        }
    }
    merged.extend(&base_lines[base_pos..]);

    if conflicts.is_empty() {
        MergeOutcome::Merged(merged.concat())
    } else {
        MergeOutcome::Conflicts(conflicts)
    }
}

fn apply<'s>(merged: &mut Vec<&'s str>, base: &[&'s str], base_pos: &mut usize, hunk: &Hunk<'s>) {
    merged.extend(&base[*base_pos..hunk.base_start]);
    merged.extend(&hunk.replacement);
    *base_pos = hunk.base_end;
}

fn overlaps(a: &Hunk<'_>, b: &Hunk<'_>) -> bool {
    let disjoint = a.base_end <= b.base_start || b.base_end <= a.base_start;
    if !disjoint {
        return true;
    }
    // zero-width hunks at the same boundary compete for the same spot
    a.base_start == b.base_start && (a.base_start == a.base_end || b.base_start == b.base_end)
}

/// Fold a side's edit script into contiguous replacement hunks
fn hunks<'s>(base: &[&'s str], side: &[&'s str]) -> Vec<Hunk<'s>> {
    let mut hunks: Vec<Hunk<'s>> = Vec::new();
    let mut open: Option<Hunk<'s>> = None;
    let mut base_idx = 0usize;

    for edit in edit_script(base, side) {
        match edit {
            Edit::Equal(_) => {
                if let Some(hunk) = open.take() {
                    hunks.push(hunk);
                }
                base_idx += 1;
            }
            Edit::Delete(_) => {
                let hunk = open.get_or_insert_with(|| Hunk {
                    base_start: base_idx,
                    base_end: base_idx,
                    replacement: Vec::new(),
                });
                hunk.base_end = base_idx + 1;
                base_idx += 1;
            }
            Edit::Insert(line) => {
                open.get_or_insert_with(|| Hunk {
                    base_start: base_idx,
                    base_end: base_idx,
                    replacement: Vec::new(),
                })
                .replacement
                .push(line);
            }
        }
    }
    if let Some(hunk) = open.take() {
        hunks.push(hunk);
    }
    hunks
}
