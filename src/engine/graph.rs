//! Commit graph and history retrieval

use crate::domain::{BranchName, Oid, Version};
use crate::engine::Engine;
use crate::error::Result;
use crate::store::Store;

/// One node of a repository's commit graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    pub id: Oid,
    pub document_id: Oid,
    pub message: String,
    pub branch: BranchName,
    pub parent_version: Option<Oid>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl<S: Store> Engine<S> {
    /// Every version in a repository, oldest first
    ///
    /// Feeds graph rendering and the divergence computation of the
    /// integration operations.
    pub async fn commit_graph(&self, repository_id: &Oid) -> Result<Vec<GraphEntry>> {
        self.store().repository(repository_id).await?;
        let versions = self.store().versions_in_repository(repository_id).await?;
        Ok(versions
            .into_iter()
            .map(|version| GraphEntry {
                id: version.id,
                document_id: version.document_id,
                message: version.commit_message,
                branch: version.branch,
                parent_version: version.parent_version,
                created_at: version.created_at,
            })
            .collect())
    }

    /// A document's versions, newest first
    pub async fn history(&self, document_id: &Oid) -> Result<Vec<Version>> {
        self.store().document(document_id).await?;
        self.store().versions_for_document(document_id).await
    }
}
