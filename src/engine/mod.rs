//! The versioning engine
//!
//! All mutating history operations live here, implemented over an injected
//! [`Store`]. The engine holds no session state of its own: every call
//! reads what it needs, computes its effects, and submits one atomic
//! mutation batch. Branch pointers advance under an optimistic
//! compare-and-swap; plain commits retry a bounded number of times when
//! the pointer moves underneath them.

mod ancestry;
mod branch;
mod cherry_pick;
mod commit;
mod graph;
mod merge;
mod patch;
mod rebase;
mod repository;

pub use graph::GraphEntry;

use crate::domain::{Branch, BranchName, Document, Oid, Version};
use crate::error::{Error, Result};
use crate::store::{MutationBatch, Store};
use std::sync::Arc;

/// Attempts a commit makes against pointer contention before giving up
pub(crate) const MAX_POINTER_ATTEMPTS: usize = 3;

/// Version-control engine over an injected storage context
#[derive(Debug)]
pub struct Engine<S> {
    store: Arc<S>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Engine {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Engine { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up a version by id
    pub async fn version(&self, id: &Oid) -> Result<Version> {
        self.store.version(id).await
    }

    /// The version of a document as seen from a branch
    ///
    /// Branch-scoped resolution, never the document's global pointer:
    /// the newest version committed on the branch itself wins; a branch
    /// with no local versions falls back to the default-branch version
    /// current at the moment the branch was created; otherwise the
    /// document has no version on that lineage yet.
    pub async fn resolve(&self, document_id: &Oid, branch: &str) -> Result<Option<Version>> {
        let branch = BranchName::try_parse(branch)?;
        self.resolve_on(document_id, &branch).await
    }

    pub(crate) async fn resolve_on(
        &self,
        document_id: &Oid,
        branch: &BranchName,
    ) -> Result<Option<Version>> {
        let document = self.store.document(document_id).await?;
        let repository = self.store.repository(&document.repository_id).await?;
        let branch = self.store.branch(&document.repository_id, branch).await?;

        let versions = self.store.versions_for_document(document_id).await?;
        if let Some(version) = versions.iter().find(|v| v.branch == branch.name) {
            return Ok(Some(version.clone()));
        }
        if !branch.is_default {
            let fork_base = versions
                .iter()
                .find(|v| v.branch == repository.default_branch && v.created_at <= branch.created_at);
            return Ok(fork_base.cloned());
        }
        Ok(None)
    }

    /// Stage a version and its document refresh into a batch
    pub(crate) fn stage(batch: &mut MutationBatch, version: &Version) {
        batch.versions.push(version.clone());
        batch.documents.push(crate::store::DocumentUpdate::new(
            version.document_id.clone(),
            version.id.clone(),
            version.content.clone(),
            version.created_at,
        ));
        batch
            .size_deltas
            .push((version.repository_id.clone(), version.content.len() as u64));
    }

    /// Reject empty commit messages
    pub(crate) fn valid_message(message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::Validation(
                "commit message cannot be empty".to_string(),
            ));
        }
        Ok(message.to_string())
    }

    /// Decode version content for line-based work
    pub(crate) fn text_of(version: &Version) -> Result<String> {
        String::from_utf8(version.content.to_vec()).map_err(|_| {
            Error::Validation(format!(
                "content of version {} is not valid utf-8",
                version.id.short()
            ))
        })
    }
}

/// A document alongside the branch it is being changed through
///
/// Bundles the two reads every mutating operation starts with.
pub(crate) struct CommitTarget {
    pub document: Document,
    pub branch: Branch,
}

impl<S: Store> Engine<S> {
    pub(crate) async fn commit_target(
        &self,
        document_id: &Oid,
        branch: &BranchName,
    ) -> Result<CommitTarget> {
        let document = self.store.document(document_id).await?;
        let branch = self.store.branch(&document.repository_id, branch).await?;
        Ok(CommitTarget { document, branch })
    }
}
