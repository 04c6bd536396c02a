//! Patch creation and application

use crate::diff::Patch;
use crate::domain::{Author, BranchName, Oid, Version, fingerprint};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::Store;

impl<S: Store> Engine<S> {
    /// Build a patch carrying the diff between two versions
    pub async fn create_patch(&self, from_version: &Oid, to_version: &Oid) -> Result<Patch> {
        let from = self.store().version(from_version).await?;
        let to = self.store().version(to_version).await?;
        let old = Self::text_of(&from)?;
        let new = Self::text_of(&to)?;
        Ok(Patch::between(
            from.version_hash.clone(),
            to.version_hash.clone(),
            &old,
            &new,
        ))
    }

    /// Apply a patch to a document on a branch
    ///
    /// The patch only applies when the branch-resolved current fingerprint
    /// equals the patch's precondition hash; anything else is a mismatch,
    /// never a forced write.
    pub async fn apply_patch(
        &self,
        document_id: &Oid,
        patch: &Patch,
        author: &Author,
        branch: &str,
    ) -> Result<Version> {
        let branch_name = BranchName::try_parse(branch)?;
        let current = self.resolve_on(document_id, &branch_name).await?;

        let actual = match &current {
            Some(version) => version.version_hash.clone(),
            None => fingerprint(b""),
        };
        if actual != patch.from_hash {
            return Err(Error::PatchMismatch {
                expected: patch.from_hash.clone(),
                actual,
            });
        }

        let content = patch.reconstruct();
        if fingerprint(content.as_bytes()) != patch.to_hash {
            return Err(Error::Corrupt(
                "patch segments do not reproduce the target fingerprint".to_string(),
            ));
        }

        self.commit_inner(
            document_id,
            bytes::Bytes::from(content),
            "Applied patch".to_string(),
            author,
            &branch_name,
        )
        .await
    }
}
