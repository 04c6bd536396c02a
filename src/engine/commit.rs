//! The commit operation
//!
//! The single mutating entry point for ordinary edits, and the primitive
//! the integration operations are built from.

use crate::domain::{Author, BranchName, Oid, Version};
use crate::engine::{Engine, MAX_POINTER_ATTEMPTS};
use crate::error::{Error, Result};
use crate::store::{BranchUpdate, MutationBatch, PointerGuard, Store};
use bytes::Bytes;

impl<S: Store> Engine<S> {
    /// Record an edit as a new immutable version
    ///
    /// Reads the document's current version on the branch as the parent,
    /// appends the new version, refreshes the document pointer, and
    /// advances the branch pointer, all in one atomic batch. Identical
    /// content commits are recorded like any other: every save is a
    /// commit, and history stays fully auditable.
    pub async fn commit(
        &self,
        document_id: &Oid,
        content: impl Into<Bytes>,
        message: &str,
        author: &Author,
        branch: &str,
    ) -> Result<Version> {
        let branch = BranchName::try_parse(branch)?;
        let message = Self::valid_message(message)?;
        self.commit_inner(document_id, content.into(), message, author, &branch)
            .await
    }

    /// Commit with a prepared message, retrying on pointer contention
    pub(crate) async fn commit_inner(
        &self,
        document_id: &Oid,
        content: Bytes,
        message: String,
        author: &Author,
        branch: &BranchName,
    ) -> Result<Version> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self
                .try_commit(document_id, content.clone(), message.clone(), author, branch)
                .await;
            match outcome {
                Err(Error::Conflict(_)) if attempts < MAX_POINTER_ATTEMPTS => continue,
                outcome => return outcome,
            }
        }
    }

    /// One optimistic commit attempt
    async fn try_commit(
        &self,
        document_id: &Oid,
        content: Bytes,
        message: String,
        author: &Author,
        branch: &BranchName,
    ) -> Result<Version> {
        let target = self.commit_target(document_id, branch).await?;
        let parent = self
            .resolve_on(document_id, branch)
            .await?
            .map(|version| version.id);

        let version = Version::new(
            target.document.repository_id.clone(),
            target.document.id.clone(),
            content,
            message,
            author.clone(),
            parent,
            target.branch.name.clone(),
        )?;

        let mut batch = MutationBatch::new();
        batch.guards.push(PointerGuard::new(
            target.branch.repository_id.clone(),
            target.branch.name.clone(),
            target.branch.latest_commit.clone(),
        ));
        Self::stage(&mut batch, &version);
        batch.branches.push(BranchUpdate::new(
            target.branch.repository_id.clone(),
            target.branch.name.clone(),
            version.id.clone(),
        ));
        self.store().apply(batch).await?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{Author, fingerprint};
    use crate::engine::Engine;
    use crate::error::Error;
    use crate::store::{MemoryStore, Store};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn author() -> Author {
        Author::new("Ada Lovelace".to_string(), "ada@example.com".to_string())
    }

    async fn engine_with_document() -> (
        Engine<MemoryStore>,
        crate::domain::Repository,
        crate::domain::Document,
    ) {
        let engine = Engine::new(Arc::new(MemoryStore::new()));
        let repository = engine
            .create_repository("notes", "scratch pad", "ada", None)
            .await
            .unwrap();
        let document = engine
            .create_document(&repository.id, "a.txt", "text/plain", "ada")
            .await
            .unwrap();
        (engine, repository, document)
    }

    #[tokio::test]
    async fn commit_advances_document_and_branch() {
        let (engine, repository, document) = engine_with_document().await;

        let version = engine
            .commit(&document.id, "hello", "first", &author(), "main")
            .await
            .unwrap();

        let stored_document = engine.store().document(&document.id).await.unwrap();
        assert_eq!(stored_document.current_version, Some(version.id.clone()));
        assert_eq!(stored_document.content, Bytes::from_static(b"hello"));

        let branch = engine
            .store()
            .branch(&repository.id, &crate::domain::BranchName::default_branch())
            .await
            .unwrap();
        assert_eq!(branch.latest_commit, Some(version.id.clone()));
        assert_eq!(version.parent_version, None);
        assert_eq!(version.version_hash, fingerprint(b"hello"));
    }

    #[tokio::test]
    async fn second_commit_chains_to_the_first() {
        let (engine, _, document) = engine_with_document().await;

        let first = engine
            .commit(&document.id, "hello", "first", &author(), "main")
            .await
            .unwrap();
        let second = engine
            .commit(&document.id, "hello world", "add world", &author(), "main")
            .await
            .unwrap();

        assert_eq!(second.parent_version, Some(first.id.clone()));

        let history = engine.history(&document.id).await.unwrap();
        assert_eq!(
            history.iter().map(|v| v.id.clone()).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn no_op_commits_are_recorded() {
        let (engine, _, document) = engine_with_document().await;

        let first = engine
            .commit(&document.id, "same", "first", &author(), "main")
            .await
            .unwrap();
        let second = engine
            .commit(&document.id, "same", "saved again", &author(), "main")
            .await
            .unwrap();

        assert_eq!(first.version_hash, second.version_hash);
        assert_ne!(first.id, second.id);
        assert_eq!(engine.history(&document.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (engine, _, document) = engine_with_document().await;
        assert!(matches!(
            engine
                .commit(&document.id, "hello", "   ", &author(), "main")
                .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let (engine, _, _) = engine_with_document().await;
        let missing = crate::domain::Oid::digest(b"missing");
        assert!(matches!(
            engine
                .commit(&missing, "hello", "first", &author(), "main")
                .await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_branch_is_not_found() {
        let (engine, _, document) = engine_with_document().await;
        assert!(matches!(
            engine
                .commit(&document.id, "hello", "first", &author(), "phantom")
                .await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_commits_all_land() {
        let (engine, repository, document) = engine_with_document().await;

        let commits = (0..3).map(|i| {
            let engine = engine.clone();
            let document_id = document.id.clone();
            async move {
                engine
                    .commit(
                        &document_id,
                        format!("content {}", i),
                        &format!("commit {}", i),
                        &author(),
                        "main",
                    )
                    .await
            }
        });
        let results = futures::future::join_all(commits).await;
        for result in &results {
            assert!(result.is_ok());
        }

        let history = engine.history(&document.id).await.unwrap();
        assert_eq!(history.len(), 3);

        // the branch pointer ends on one of the recorded versions
        let branch = engine
            .store()
            .branch(&repository.id, &crate::domain::BranchName::default_branch())
            .await
            .unwrap();
        assert!(history.iter().any(|v| Some(&v.id) == branch.latest_commit.as_ref()));

        let total: u64 = history.iter().map(|v| v.content.len() as u64).sum();
        assert_eq!(
            engine.store().repository(&repository.id).await.unwrap().total_size,
            total
        );
    }
}
