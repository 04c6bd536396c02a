//! Repository and document registration

use crate::domain::{Branch, BranchName, Document, Oid, Repository};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::Store;

impl<S: Store> Engine<S> {
    /// Create a repository together with its default branch
    pub async fn create_repository(
        &self,
        name: &str,
        description: &str,
        owner: &str,
        default_branch: Option<&str>,
    ) -> Result<Repository> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "repository name cannot be empty".to_string(),
            ));
        }
        let branch_name = match default_branch {
            Some(name) => BranchName::try_parse(name)?,
            None => BranchName::default_branch(),
        };

        let repository = Repository::new(
            name.to_string(),
            description.to_string(),
            owner.to_string(),
            branch_name.clone(),
        );
        self.store().insert_repository(repository.clone()).await?;
        self.store()
            .insert_branch(Branch::new(repository.id.clone(), branch_name, true))
            .await?;
        Ok(repository)
    }

    /// Register a document with no versions yet
    ///
    /// Commits against unknown documents fail; registration is the only
    /// way a document comes into existence.
    pub async fn create_document(
        &self,
        repository_id: &Oid,
        title: &str,
        mime_type: &str,
        owner: &str,
    ) -> Result<Document> {
        if title.trim().is_empty() || title.contains('\n') {
            return Err(Error::Validation(format!(
                "invalid document title: {:?}",
                title
            )));
        }
        self.store().repository(repository_id).await?;

        let document = Document::new(
            repository_id.clone(),
            owner.to_string(),
            title.to_string(),
            mime_type.to_string(),
        );
        self.store().insert_document(document.clone()).await?;
        Ok(document)
    }

    /// Find a repository's document by title
    pub async fn document_by_title(
        &self,
        repository_id: &Oid,
        title: &str,
    ) -> Result<Option<Document>> {
        let documents = self.store().documents(repository_id).await?;
        Ok(documents.into_iter().find(|d| d.title == title))
    }
}
