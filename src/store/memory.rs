//! In-memory store
//!
//! The reference implementation of the persistence boundary: all four
//! tables live in process memory behind a single `tokio::sync::RwLock`, so
//! a mutation batch applies under one write guard and is trivially atomic.
//! This is the test double the engine's dependency-injection design exists
//! for, and it is also what backs scripted, throwaway sessions.

use crate::domain::{Branch, BranchName, Document, Oid, Repository, Version};
use crate::error::{Entity, Error, Result};
use crate::store::{MutationBatch, Store, sort_ascending};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    repositories: HashMap<Oid, Repository>,
    branches: Vec<Branch>,
    documents: HashMap<Oid, Document>,
    versions: HashMap<Oid, Version>,
}

/// Store keeping every record in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn branch(&self, repository_id: &Oid, name: &BranchName) -> Result<&Branch> {
        self.branches
            .iter()
            .find(|b| &b.repository_id == repository_id && &b.name == name)
            .ok_or_else(|| Error::not_found(Entity::Branch, name))
    }

    fn branch_mut(&mut self, repository_id: &Oid, name: &BranchName) -> Result<&mut Branch> {
        self.branches
            .iter_mut()
            .find(|b| &b.repository_id == repository_id && &b.name == name)
            .ok_or_else(|| Error::not_found(Entity::Branch, name))
    }

    /// Check a batch against live state without mutating anything
    fn validate(&self, batch: &MutationBatch) -> Result<()> {
        for guard in &batch.guards {
            let branch = self.branch(&guard.repository_id, &guard.branch)?;
            if branch.latest_commit != guard.expected {
                return Err(Error::Conflict(format!(
                    "branch pointer for {} moved concurrently",
                    guard.branch
                )));
            }
        }
        for version in &batch.versions {
            let document = self
                .documents
                .get(&version.document_id)
                .ok_or_else(|| Error::not_found(Entity::Document, &version.document_id))?;
            if document.repository_id != version.repository_id {
                return Err(Error::Validation(
                    "version repository does not match its document".to_string(),
                ));
            }
            if let Some(parent_id) = &version.parent_version {
                // a parent staged earlier in the same batch is also valid
                let staged = batch.versions.iter().find(|v| &v.id == parent_id);
                let parent = staged
                    .or_else(|| self.versions.get(parent_id))
                    .ok_or_else(|| Error::not_found(Entity::Version, parent_id))?;
                if parent.document_id != version.document_id {
                    return Err(Error::Validation(
                        "parent version belongs to a different document".to_string(),
                    ));
                }
            }
        }
        for update in &batch.documents {
            if !self.documents.contains_key(&update.document_id) {
                return Err(Error::not_found(Entity::Document, &update.document_id));
            }
        }
        for update in &batch.branches {
            self.branch(&update.repository_id, &update.branch)?;
        }
        for (repository_id, _) in &batch.size_deltas {
            if !self.repositories.contains_key(repository_id) {
                return Err(Error::not_found(Entity::Repository, repository_id));
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn insert_repository(&self, repository: Repository) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.repositories.contains_key(&repository.id) {
            return Err(Error::Conflict(format!(
                "repository {} already exists",
                repository.id
            )));
        }
        tables.repositories.insert(repository.id.clone(), repository);
        Ok(())
    }

    async fn repository(&self, id: &Oid) -> Result<Repository> {
        self.tables
            .read()
            .await
            .repositories
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(Entity::Repository, id))
    }

    async fn insert_branch(&self, branch: Branch) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.repositories.contains_key(&branch.repository_id) {
            return Err(Error::not_found(Entity::Repository, &branch.repository_id));
        }
        if tables.branch(&branch.repository_id, &branch.name).is_ok() {
            return Err(Error::Conflict(format!(
                "branch {} already exists",
                branch.name
            )));
        }
        if branch.is_default
            && tables
                .branches
                .iter()
                .any(|b| b.repository_id == branch.repository_id && b.is_default)
        {
            return Err(Error::Conflict(
                "repository already has a default branch".to_string(),
            ));
        }
        tables.branches.push(branch);
        Ok(())
    }

    async fn branch(&self, repository_id: &Oid, name: &BranchName) -> Result<Branch> {
        self.tables
            .read()
            .await
            .branch(repository_id, name)
            .cloned()
    }

    async fn branches(&self, repository_id: &Oid) -> Result<Vec<Branch>> {
        Ok(self
            .tables
            .read()
            .await
            .branches
            .iter()
            .filter(|b| &b.repository_id == repository_id)
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: Document) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.repositories.contains_key(&document.repository_id) {
            return Err(Error::not_found(
                Entity::Repository,
                &document.repository_id,
            ));
        }
        if tables.documents.contains_key(&document.id) {
            return Err(Error::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        tables.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn document(&self, id: &Oid) -> Result<Document> {
        self.tables
            .read()
            .await
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(Entity::Document, id))
    }

    async fn documents(&self, repository_id: &Oid) -> Result<Vec<Document>> {
        Ok(self
            .tables
            .read()
            .await
            .documents
            .values()
            .filter(|d| &d.repository_id == repository_id)
            .cloned()
            .collect())
    }

    async fn version(&self, id: &Oid) -> Result<Version> {
        self.tables
            .read()
            .await
            .versions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(Entity::Version, id))
    }

    async fn versions_for_document(&self, document_id: &Oid) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .tables
            .read()
            .await
            .versions
            .values()
            .filter(|v| &v.document_id == document_id)
            .cloned()
            .collect();
        sort_ascending(&mut versions);
        versions.reverse();
        Ok(versions)
    }

    async fn versions_on_branch(
        &self,
        repository_id: &Oid,
        branch: &BranchName,
    ) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .tables
            .read()
            .await
            .versions
            .values()
            .filter(|v| &v.repository_id == repository_id && &v.branch == branch)
            .cloned()
            .collect();
        sort_ascending(&mut versions);
        Ok(versions)
    }

    async fn versions_in_repository(&self, repository_id: &Oid) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .tables
            .read()
            .await
            .versions
            .values()
            .filter(|v| &v.repository_id == repository_id)
            .cloned()
            .collect();
        sort_ascending(&mut versions);
        Ok(versions)
    }

    async fn apply(&self, batch: MutationBatch) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.validate(&batch)?;

        for version in batch.versions {
            tables.versions.insert(version.id.clone(), version);
        }
        for update in batch.documents {
            let document = tables
                .documents
                .get_mut(&update.document_id)
                .expect("validated above");
            document.file_size = Some(update.content.len() as u64);
            document.current_version = Some(update.current_version);
            document.content = update.content;
            document.updated_at = update.updated_at;
        }
        for update in batch.branches {
            let branch = tables.branch_mut(&update.repository_id, &update.branch)?;
            branch.latest_commit = Some(update.latest_commit);
        }
        for (repository_id, delta) in batch.size_deltas {
            let repository = tables
                .repositories
                .get_mut(&repository_id)
                .expect("validated above");
            repository.total_size += delta;
        }
        Ok(())
    }
}
