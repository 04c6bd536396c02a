//! Content-addressed patches

use crate::diff::{DiffKind, DiffSegment, diff_lines};
use crate::domain::oid::Oid;

/// A reconciliation patch between two version contents
///
/// `from_hash` is the precondition: the patch only applies to content whose
/// fingerprint matches it. Patches are never force-applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub from_hash: Oid,
    pub to_hash: Oid,
    pub segments: Vec<DiffSegment>,
}

impl Patch {
    /// Build a patch carrying the diff from `old` to `new`
    pub fn between(from_hash: Oid, to_hash: Oid, old: &str, new: &str) -> Self {
        Patch {
            from_hash,
            to_hash,
            segments: diff_lines(old, new),
        }
    }

    /// Reconstruct the target content from the segment list
    pub fn reconstruct(&self) -> String {
        self.segments
            .iter()
            .filter(|segment| segment.kind != DiffKind::Removed)
            .map(|segment| segment.text.as_str())
            .collect()
    }
}
