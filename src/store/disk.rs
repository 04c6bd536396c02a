//! On-disk store
//!
//! A local, single-repository backing store in a `.scriv` directory:
//!
//! ```text
//! .scriv/
//!   repository            # repository record
//!   objects/xx/yyyy...    # zlib-compressed version records, content-addressed
//!   refs/heads/<branch>   # branch records, one file per branch
//!   documents/<id>        # document records with their content mirror
//!   lock                  # store-wide writer lock
//! ```
//!
//! Version records are immutable once written, so object files are written
//! through a temp file and renamed into place. Mutation batches serialize
//! on an exclusive advisory lock over the `lock` file, which is what makes
//! the pointer-guard check and the subsequent writes a single unit with
//! respect to other writers.

use crate::domain::{Branch, BranchName, Document, Oid, Packable, Repository, Unpackable, Version};
use crate::error::{Entity, Error, Result};
use crate::store::{MutationBatch, Store, sort_ascending};
use bytes::Bytes;
use fake::rand;
use file_guard::Lock;
use std::io::{Cursor, Read, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Store rooted at a `.scriv` directory
#[derive(Debug)]
pub struct DiskStore {
    path: Box<Path>,
}

impl DiskStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        DiskStore {
            path: path.as_ref().to_path_buf().into_boxed_path(),
        }
    }

    /// Whether a repository record exists under this root
    pub fn is_initialized(&self) -> bool {
        self.repository_path().exists()
    }

    /// The single repository this store holds
    pub async fn current_repository(&self) -> Result<Repository> {
        self.read_repository()
    }

    fn repository_path(&self) -> PathBuf {
        self.path.join("repository")
    }

    fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    fn heads_path(&self) -> PathBuf {
        self.path.join("refs").join("heads")
    }

    fn documents_path(&self) -> PathBuf {
        self.path.join("documents")
    }

    fn lock_path(&self) -> PathBuf {
        self.path.join("lock")
    }

    fn branch_path(&self, name: &BranchName) -> PathBuf {
        self.heads_path().join(name.as_ref())
    }

    fn read_repository(&self) -> Result<Repository> {
        let path = self.repository_path();
        if !path.exists() {
            return Err(Error::not_found(Entity::Repository, "local store"));
        }
        Repository::deserialize(Cursor::new(std::fs::read(path)?))
    }

    fn write_repository(&self, repository: &Repository) -> Result<()> {
        self.write_record(&self.repository_path(), repository.serialize()?)
    }

    fn read_branch(&self, repository_id: &Oid, name: &BranchName) -> Result<Branch> {
        let path = self.branch_path(name);
        if !path.exists() {
            return Err(Error::not_found(Entity::Branch, name));
        }
        let branch = Branch::deserialize(Cursor::new(std::fs::read(path)?))?;
        if &branch.repository_id != repository_id {
            return Err(Error::not_found(Entity::Branch, name));
        }
        Ok(branch)
    }

    /// Write a branch record under an exclusive lock on the ref file
    fn write_branch(&self, branch: &Branch) -> Result<()> {
        let path = self.branch_path(&branch.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(&branch.serialize()?)?;
        Ok(())
    }

    fn read_document(&self, id: &Oid) -> Result<Document> {
        let path = self.documents_path().join(id.as_ref());
        if !path.exists() {
            return Err(Error::not_found(Entity::Document, id));
        }
        Document::deserialize(Cursor::new(std::fs::read(path)?))
    }

    fn write_document(&self, document: &Document) -> Result<()> {
        self.write_record(
            &self.documents_path().join(document.id.as_ref()),
            document.serialize()?,
        )
    }

    fn read_version(&self, id: &Oid) -> Result<Version> {
        let path = self.objects_path().join(id.to_path());
        if !path.exists() {
            return Err(Error::not_found(Entity::Version, id));
        }
        let raw = decompress(Bytes::from(std::fs::read(path)?))?;
        Version::deserialize(Cursor::new(raw))
    }

    /// Write a version object unless it already exists
    fn write_version(&self, version: &Version) -> Result<()> {
        let path = self.objects_path().join(version.id.to_path());
        if path.exists() {
            return Ok(());
        }
        self.write_record(&path, compress(version.serialize()?)?)
    }

    /// Write bytes through a temp file and rename into place
    fn write_record(&self, path: &Path, content: Bytes) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Corrupt(format!("record path {} has no parent", path.display())))?;
        std::fs::create_dir_all(dir)?;

        let temp_path = dir.join(generate_temp_name());
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn walk_records(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.path().to_path_buf())
            .collect()
    }

    fn load_versions(&self) -> Result<Vec<Version>> {
        self.walk_records(&self.objects_path())
            .into_iter()
            .map(|path| {
                let raw = decompress(Bytes::from(std::fs::read(path)?))?;
                Version::deserialize(Cursor::new(raw))
            })
            .collect()
    }

    /// Check the repository record exists and matches the given id
    fn expect_repository(&self, id: &Oid) -> Result<Repository> {
        let repository = self.read_repository()?;
        if &repository.id != id {
            return Err(Error::not_found(Entity::Repository, id));
        }
        Ok(repository)
    }
}

impl Store for DiskStore {
    async fn insert_repository(&self, repository: Repository) -> Result<()> {
        if self.repository_path().exists() {
            return Err(Error::Conflict(
                "store already holds a repository".to_string(),
            ));
        }
        std::fs::create_dir_all(self.objects_path())?;
        std::fs::create_dir_all(self.heads_path())?;
        std::fs::create_dir_all(self.documents_path())?;
        self.write_repository(&repository)
    }

    async fn repository(&self, id: &Oid) -> Result<Repository> {
        self.expect_repository(id)
    }

    async fn insert_branch(&self, branch: Branch) -> Result<()> {
        self.expect_repository(&branch.repository_id)?;
        if self.branch_path(&branch.name).exists() {
            return Err(Error::Conflict(format!(
                "branch {} already exists",
                branch.name
            )));
        }
        if branch.is_default {
            let branches = self.branches(&branch.repository_id).await?;
            if branches.iter().any(|b| b.is_default) {
                return Err(Error::Conflict(
                    "repository already has a default branch".to_string(),
                ));
            }
        }
        self.write_branch(&branch)
    }

    async fn branch(&self, repository_id: &Oid, name: &BranchName) -> Result<Branch> {
        self.read_branch(repository_id, name)
    }

    async fn branches(&self, repository_id: &Oid) -> Result<Vec<Branch>> {
        self.walk_records(&self.heads_path())
            .into_iter()
            .map(|path| Branch::deserialize(Cursor::new(std::fs::read(path)?)))
            .filter(|branch| match branch {
                Ok(branch) => &branch.repository_id == repository_id,
                Err(_) => true,
            })
            .collect()
    }

    async fn insert_document(&self, document: Document) -> Result<()> {
        self.expect_repository(&document.repository_id)?;
        let path = self.documents_path().join(document.id.as_ref());
        if path.exists() {
            return Err(Error::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        self.write_document(&document)
    }

    async fn document(&self, id: &Oid) -> Result<Document> {
        self.read_document(id)
    }

    async fn documents(&self, repository_id: &Oid) -> Result<Vec<Document>> {
        self.walk_records(&self.documents_path())
            .into_iter()
            .map(|path| Document::deserialize(Cursor::new(std::fs::read(path)?)))
            .filter(|document| match document {
                Ok(document) => &document.repository_id == repository_id,
                Err(_) => true,
            })
            .collect()
    }

    async fn version(&self, id: &Oid) -> Result<Version> {
        self.read_version(id)
    }

    async fn versions_for_document(&self, document_id: &Oid) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .load_versions()?
            .into_iter()
            .filter(|v| &v.document_id == document_id)
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
            .load_versions()?
            .into_iter()
            .filter(|v| &v.repository_id == repository_id && &v.branch == branch)
            .collect();
        sort_ascending(&mut versions);
        Ok(versions)
    }

    async fn versions_in_repository(&self, repository_id: &Oid) -> Result<Vec<Version>> {
        let mut versions: Vec<Version> = self
            .load_versions()?
            .into_iter()
            .filter(|v| &v.repository_id == repository_id)
            .collect();
        sort_ascending(&mut versions);
        Ok(versions)
    }

    async fn apply(&self, batch: MutationBatch) -> Result<()> {
        // serialize writers on the store-wide lock file
        let mut lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        let _guard = file_guard::lock(&mut lock_file, Lock::Exclusive, 0, 1)?;

        for guard in &batch.guards {
            let branch = self.read_branch(&guard.repository_id, &guard.branch)?;
            if branch.latest_commit != guard.expected {
                return Err(Error::Conflict(format!(
                    "branch pointer for {} moved concurrently",
                    guard.branch
                )));
            }
        }
        for version in &batch.versions {
            let document = self.read_document(&version.document_id)?;
            if document.repository_id != version.repository_id {
                return Err(Error::Validation(
                    "version repository does not match its document".to_string(),
                ));
            }
            if let Some(parent_id) = &version.parent_version {
                let staged = batch.versions.iter().find(|v| &v.id == parent_id).cloned();
                let parent = match staged {
                    Some(parent) => parent,
                    None => self.read_version(parent_id)?,
                };
                if parent.document_id != version.document_id {
                    return Err(Error::Validation(
                        "parent version belongs to a different document".to_string(),
                    ));
                }
            }
        }

        for version in &batch.versions {
            self.write_version(version)?;
        }
        for update in &batch.documents {
            let mut document = self.read_document(&update.document_id)?;
            document.file_size = Some(update.content.len() as u64);
            document.current_version = Some(update.current_version.clone());
            document.content = update.content.clone();
            document.updated_at = update.updated_at;
            self.write_document(&document)?;
        }
        for update in &batch.branches {
            let mut branch = self.read_branch(&update.repository_id, &update.branch)?;
            branch.latest_commit = Some(update.latest_commit.clone());
            self.write_branch(&branch)?;
        }
        for (repository_id, delta) in &batch.size_deltas {
            let mut repository = self.expect_repository(repository_id)?;
            repository.total_size += *delta;
            self.write_repository(&repository)?;
        }
        Ok(())
    }
}

fn compress(data: Bytes) -> Result<Bytes> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&data)?;
    Ok(Bytes::from(encoder.finish()?))
}

fn decompress(data: Bytes) -> Result<Bytes> {
    let mut decoder = flate2::read::ZlibDecoder::new(Cursor::new(data));
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(Bytes::from(decompressed))
}

fn generate_temp_name() -> String {
    format!("tmp-rec-{}", rand::random::<u32>())
}
