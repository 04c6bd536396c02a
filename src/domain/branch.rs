//! Branch record

use crate::domain::branch_name::BranchName;
use crate::domain::oid::Oid;
use crate::domain::{Fields, Packable, Unpackable, parse_timestamp, strip_field};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{BufRead, Read, Write};

/// A named, independently advancing pointer into a repository's history
///
/// `(repository_id, name)` is unique. `latest_commit` is the contended
/// pointer every commit advances; it stays `None` until the first commit
/// lands on the branch. Exactly one branch per repository carries
/// `is_default`, set at repository creation and never reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub id: Oid,
    pub repository_id: Oid,
    pub name: BranchName,
    pub latest_commit: Option<Oid>,
    pub is_default: bool,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl Branch {
    pub fn new(repository_id: Oid, name: BranchName, is_default: bool) -> Self {
        let id = Oid::generate(format!("{}\0{}", repository_id, name).as_bytes());
        Branch {
            id,
            repository_id,
            name,
            latest_commit: None,
            is_default,
            created_at: crate::domain::now(),
        }
    }

    /// A branch cut at an existing version, for branch-from-version
    pub fn at_version(repository_id: Oid, name: BranchName, version_id: Oid) -> Self {
        let mut branch = Self::new(repository_id, name, false);
        branch.latest_commit = Some(version_id);
        branch
    }
}

impl Packable for Branch {
    fn serialize(&self) -> Result<Bytes> {
        let mut record = Vec::new();
        writeln!(record, "id {}", self.id)?;
        writeln!(record, "repository {}", self.repository_id)?;
        writeln!(record, "name {}", self.name)?;
        if let Some(latest) = &self.latest_commit {
            writeln!(record, "latest {}", latest)?;
        }
        writeln!(record, "default {}", self.is_default)?;
        writeln!(record, "created {}", self.created_at.to_rfc3339())?;
        Ok(Bytes::from(record))
    }
}

impl Unpackable for Branch {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        let mut fields = Fields::new(&raw);

        let id = Oid::try_parse(strip_field(fields.next()?, "id")?.to_string())?;
        let repository_id = Oid::try_parse(strip_field(fields.next()?, "repository")?.to_string())?;
        let name = BranchName::try_parse(strip_field(fields.next()?, "name")?)?;

        let latest_commit = match fields.peek() {
            Some(line) if line.starts_with("latest ") => {
                Some(Oid::try_parse(strip_field(fields.next()?, "latest")?.to_string())?)
            }
            _ => None,
        };

        let is_default = strip_field(fields.next()?, "default")?
            .parse::<bool>()
            .map_err(|e| Error::Corrupt(format!("invalid default flag: {}", e)))?;
        let created_at = parse_timestamp(strip_field(fields.next()?, "created")?)?;

        Ok(Branch {
            id,
            repository_id,
            name,
            latest_commit,
            is_default,
            created_at,
        })
    }
}
