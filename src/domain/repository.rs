//! Repository record

use crate::domain::branch_name::BranchName;
use crate::domain::oid::Oid;
use crate::domain::{Fields, Packable, Unpackable, parse_timestamp, strip_field};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{BufRead, Read, Write};

/// A repository of versioned documents
///
/// Created once; its `total_size` counter grows with every version
/// insertion that carries payload. The engine never deletes repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: Oid,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub default_branch: BranchName,
    pub total_size: u64,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl Repository {
    pub fn new(
        name: String,
        description: String,
        owner: String,
        default_branch: BranchName,
    ) -> Self {
        let id = Oid::generate(format!("{}\0{}", owner, name).as_bytes());
        Repository {
            id,
            name,
            description,
            owner,
            default_branch,
            total_size: 0,
            created_at: crate::domain::now(),
        }
    }
}

impl Packable for Repository {
    fn serialize(&self) -> Result<Bytes> {
        let mut record = Vec::new();
        writeln!(record, "id {}", self.id)?;
        writeln!(record, "name {}", self.name)?;
        writeln!(record, "owner {}", self.owner)?;
        writeln!(record, "default-branch {}", self.default_branch)?;
        writeln!(record, "total-size {}", self.total_size)?;
        writeln!(record, "created {}", self.created_at.to_rfc3339())?;
        writeln!(record)?;
        record.write_all(self.description.as_bytes())?;
        Ok(Bytes::from(record))
    }
}

impl Unpackable for Repository {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;

        let (headers, description) = raw
            .split_once("\n\n")
            .ok_or_else(|| Error::Corrupt("repository record has no body".to_string()))?;
        let mut fields = Fields::new(headers);

        let id = Oid::try_parse(strip_field(fields.next()?, "id")?.to_string())?;
        let name = strip_field(fields.next()?, "name")?.to_string();
        let owner = strip_field(fields.next()?, "owner")?.to_string();
        let default_branch = BranchName::try_parse(strip_field(fields.next()?, "default-branch")?)?;
        let total_size = strip_field(fields.next()?, "total-size")?
            .parse::<u64>()
            .map_err(|e| Error::Corrupt(format!("invalid total-size: {}", e)))?;
        let created_at = parse_timestamp(strip_field(fields.next()?, "created")?)?;

        Ok(Repository {
            id,
            name,
            description: description.to_string(),
            owner,
            default_branch,
            total_size,
            created_at,
        })
    }
}
