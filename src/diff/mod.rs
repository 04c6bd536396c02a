//! Line-level diff and patch engine
//!
//! Pure functions over text content: no store access, no side effects.
//! The diff is a classic longest-common-subsequence edit script computed
//! with Myers' shortest-edit algorithm and folded into run-length
//! segments. Lines are split inclusively of their terminators, so
//! concatenating the surviving segments reproduces the target content
//! byte for byte.

mod myers;
mod patch;
mod three_way;

pub use patch::Patch;
pub use three_way::{MergeOutcome, three_way_merge};

use derive_new::new;
use myers::{Edit, edit_script};

/// Classification of a diff segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
}

/// A run of consecutive lines sharing one diff classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub kind: DiffKind,
    pub text: String,
    pub line_count: usize,
}

/// Half-open range of base line indices, for conflict reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.end > self.start + 1 {
            write!(f, "lines {}-{}", self.start + 1, self.end)
        } else {
            write!(f, "line {}", self.start + 1)
        }
    }
}

/// Compute the line diff between two contents
///
/// Deterministic and restartable. Reconstructing the new content from the
/// `Unchanged` and `Added` segments, in order, reproduces it exactly; the
/// `Unchanged` and `Removed` segments likewise reproduce the old content.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffSegment> {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    let mut segments: Vec<DiffSegment> = Vec::new();
    for edit in edit_script(&old_lines, &new_lines) {
        let (kind, line) = match edit {
            Edit::Insert(line) => (DiffKind::Added, *line),
            Edit::Delete(line) => (DiffKind::Removed, *line),
            Edit::Equal(line) => (DiffKind::Unchanged, *line),
        };
        match segments.last_mut() {
            Some(segment) if segment.kind == kind => {
                segment.text.push_str(line);
                segment.line_count += 1;
            }
            _ => segments.push(DiffSegment {
                kind,
                text: line.to_string(),
                line_count: 1,
            }),
        }
    }
    segments
}
