//! Branch registry operations

use crate::domain::{Branch, BranchName, Oid};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::Store;

impl<S: Store> Engine<S> {
    /// Create an empty branch
    ///
    /// The default branch exists from repository creation and is never
    /// reassigned, so explicitly created branches are always non-default.
    pub async fn create_branch(&self, repository_id: &Oid, name: &str) -> Result<Branch> {
        let name = BranchName::try_parse(name)?;
        self.store().repository(repository_id).await?;

        let branch = Branch::new(repository_id.clone(), name, false);
        self.store().insert_branch(branch.clone()).await?;
        Ok(branch)
    }

    /// Create a branch whose pointer starts at an existing version
    pub async fn branch_from_version(
        &self,
        repository_id: &Oid,
        version_id: &Oid,
        name: &str,
    ) -> Result<Branch> {
        let name = BranchName::try_parse(name)?;
        let version = self.store().version(version_id).await?;
        if &version.repository_id != repository_id {
            return Err(Error::Validation(format!(
                "version {} belongs to a different repository",
                version.id.short()
            )));
        }

        let branch = Branch::at_version(repository_id.clone(), name, version.id);
        self.store().insert_branch(branch.clone()).await?;
        Ok(branch)
    }

    /// All branches of a repository
    pub async fn branches(&self, repository_id: &Oid) -> Result<Vec<Branch>> {
        self.store().repository(repository_id).await?;
        self.store().branches(repository_id).await
    }
}
