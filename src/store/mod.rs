//! Persistence boundary of the engine
//!
//! The engine never talks to a backing medium directly; it consumes the
//! [`Store`] trait and receives its storage context by injection. Reads are
//! plain filtered selects. Writes that advance history travel as a single
//! [`MutationBatch`] carrying the branch pointers the caller observed:
//! the store applies a batch entirely or not at all, and refuses it with a
//! conflict when a guarded pointer has moved. That compare-and-swap is what
//! keeps concurrent commits against one branch serializable.

pub mod disk;
pub mod memory;

use crate::domain::{Branch, BranchName, Document, Oid, Repository, Version};
use crate::error::Result;
use bytes::Bytes;
use derive_new::new;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Branch pointer value a batch was computed against
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PointerGuard {
    pub repository_id: Oid,
    pub branch: BranchName,
    pub expected: Option<Oid>,
}

/// Document pointer and read-cache refresh
#[derive(Debug, Clone, new)]
pub struct DocumentUpdate {
    pub document_id: Oid,
    pub current_version: Oid,
    pub content: Bytes,
    pub updated_at: chrono::DateTime<chrono::FixedOffset>,
}

/// Branch pointer advance
#[derive(Debug, Clone, new)]
pub struct BranchUpdate {
    pub repository_id: Oid,
    pub branch: BranchName,
    pub latest_commit: Oid,
}

/// Atomic unit of history mutation
///
/// One batch per commit, cherry-pick, whole rebase, or whole merge. A
/// failure applies nothing.
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    pub guards: Vec<PointerGuard>,
    pub versions: Vec<Version>,
    pub documents: Vec<DocumentUpdate>,
    pub branches: Vec<BranchUpdate>,
    /// Repository size increments, in payload bytes
    pub size_deltas: Vec<(Oid, u64)>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The full persistence surface the engine requires
///
/// Selects are filtered by equality and ordered by creation time; the only
/// write with preconditions is [`Store::apply`]. Implementations must not
/// swallow failures: every error surfaces to the engine as-is.
pub trait Store: Send + Sync {
    // repositories
    fn insert_repository(&self, repository: Repository) -> impl Future<Output = Result<()>>;
    fn repository(&self, id: &Oid) -> impl Future<Output = Result<Repository>>;

    // branches
    fn insert_branch(&self, branch: Branch) -> impl Future<Output = Result<()>>;
    fn branch(
        &self,
        repository_id: &Oid,
        name: &BranchName,
    ) -> impl Future<Output = Result<Branch>>;
    fn branches(&self, repository_id: &Oid) -> impl Future<Output = Result<Vec<Branch>>>;

    // documents
    fn insert_document(&self, document: Document) -> impl Future<Output = Result<()>>;
    fn document(&self, id: &Oid) -> impl Future<Output = Result<Document>>;
    fn documents(&self, repository_id: &Oid) -> impl Future<Output = Result<Vec<Document>>>;

    // versions
    fn version(&self, id: &Oid) -> impl Future<Output = Result<Version>>;
    /// All versions of a document, newest first
    fn versions_for_document(&self, document_id: &Oid)
    -> impl Future<Output = Result<Vec<Version>>>;
    /// All versions committed on a branch, oldest first
    ///
    /// Ascending order is a hard requirement: rebase and merge replay in
    /// this order, and replaying out of order inverts dependencies.
    fn versions_on_branch(
        &self,
        repository_id: &Oid,
        branch: &BranchName,
    ) -> impl Future<Output = Result<Vec<Version>>>;
    /// Every version in a repository, oldest first
    fn versions_in_repository(
        &self,
        repository_id: &Oid,
    ) -> impl Future<Output = Result<Vec<Version>>>;

    /// Apply a mutation batch atomically
    ///
    /// Checks every [`PointerGuard`] against the live branch pointers and
    /// fails with a conflict if any moved; on success every version,
    /// document update, branch update, and size delta lands together.
    fn apply(&self, batch: MutationBatch) -> impl Future<Output = Result<()>>;
}

/// Order versions oldest-first by creation time, id as a stable tie-break
pub(crate) fn sort_ascending(versions: &mut [Version]) {
    versions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
