//! Error types for the versioning engine
//!
//! Every failure surfaced by the engine maps to one of these kinds. Store
//! implementations never swallow errors and the engine never leaves a
//! partial mutation behind: a failed operation reads as if it never ran.

use crate::diff::LineRange;
use crate::domain::oid::Oid;
use thiserror::Error;

/// The entity kind a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Repository,
    Branch,
    Document,
    Version,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Repository => "repository",
            Entity::Branch => "branch",
            Entity::Document => "document",
            Entity::Version => "version",
        };
        write!(f, "{}", name)
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("patch does not match current content: expected {expected}, found {actual}")]
    PatchMismatch { expected: Oid, actual: Oid },

    #[error("merge conflict in document {document_id}: {} overlapping region(s)", .ranges.len())]
    MergeConflict {
        document_id: Oid,
        ranges: Vec<LineRange>,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl Error {
    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
