//! Cherry-pick: replay a single version onto another branch

use crate::domain::{Author, BranchName, Oid, Version};
use crate::engine::Engine;
use crate::error::Result;
use crate::store::Store;

impl<S: Store> Engine<S> {
    /// Re-commit one version's content onto a target branch
    ///
    /// The new version grafts onto the destination lineage: its parent is
    /// the target branch's current version of the same document, never the
    /// picked version's own parent.
    pub async fn cherry_pick(
        &self,
        version_id: &Oid,
        target_branch: &str,
        author: &Author,
    ) -> Result<Version> {
        let target_branch = BranchName::try_parse(target_branch)?;
        let source = self.store().version(version_id).await?;

        let message = format!("Cherry-pick: {}", source.commit_message);
        self.commit_inner(
            &source.document_id,
            source.content.clone(),
            message,
            author,
            &target_branch,
        )
        .await
    }
}
