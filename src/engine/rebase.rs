//! Rebase: replay a branch's versions onto another branch

use crate::domain::{Author, BranchName, Oid, Version};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::{BranchUpdate, MutationBatch, PointerGuard, Store};
use std::collections::HashMap;

impl<S: Store> Engine<S> {
    /// Replay every version of `source_branch` onto `target_branch`
    ///
    /// Versions replay in ascending creation order; each replayed version
    /// chains onto the previously replayed version of its document, the
    /// first onto the target's prior version of that document. The whole
    /// replay is one transaction: if anything fails, or the caller drops
    /// the future between steps, nothing is applied.
    pub async fn rebase(
        &self,
        repository_id: &Oid,
        source_branch: &str,
        target_branch: &str,
        author: &Author,
    ) -> Result<Vec<Version>> {
        let source = BranchName::try_parse(source_branch)?;
        let target = BranchName::try_parse(target_branch)?;
        if source == target {
            return Err(Error::Validation(
                "cannot rebase a branch onto itself".to_string(),
            ));
        }

        self.store().repository(repository_id).await?;
        self.store().branch(repository_id, &source).await?;
        let target_record = self.store().branch(repository_id, &target).await?;

        let source_versions = self
            .store()
            .versions_on_branch(repository_id, &source)
            .await?;

        let mut batch = MutationBatch::new();
        batch.guards.push(PointerGuard::new(
            repository_id.clone(),
            target.clone(),
            target_record.latest_commit.clone(),
        ));

        let mut replayed: Vec<Version> = Vec::new();
        let mut staged_tips: HashMap<Oid, Oid> = HashMap::new();

        for version in source_versions {
            // cancellation point between replay steps
            tokio::task::yield_now().await;

            let parent = match staged_tips.get(&version.document_id) {
                Some(tip) => Some(tip.clone()),
                None => self
                    .resolve_on(&version.document_id, &target)
                    .await?
                    .map(|prior| prior.id),
            };

            let new_version = Version::new(
                repository_id.clone(),
                version.document_id.clone(),
                version.content.clone(),
                format!("Rebased: {}", version.commit_message),
                author.clone(),
                parent,
                target.clone(),
            )?;
            staged_tips.insert(version.document_id.clone(), new_version.id.clone());
            Self::stage(&mut batch, &new_version);
            replayed.push(new_version);
        }

        if let Some(last) = replayed.last() {
            batch.branches.push(BranchUpdate::new(
                repository_id.clone(),
                target,
                last.id.clone(),
            ));
            self.store().apply(batch).await?;
        }
        Ok(replayed)
    }
}
