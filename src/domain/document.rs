//! Document record

use crate::domain::oid::Oid;
use crate::domain::{Fields, Packable, Unpackable, parse_timestamp, strip_field};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{BufRead, Read, Write};

/// A logical file or text unit inside a repository
///
/// `current_version` and the `content` mirror track the globally-latest
/// version as a read cache only; the version store stays authoritative, and
/// branch-scoped reads always go through per-branch resolution instead of
/// this pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Oid,
    pub repository_id: Oid,
    pub owner: String,
    pub title: String,
    pub mime_type: String,
    pub file_size: Option<u64>,
    pub current_version: Option<Oid>,
    pub content: Bytes,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    pub updated_at: chrono::DateTime<chrono::FixedOffset>,
}

impl Document {
    pub fn new(repository_id: Oid, owner: String, title: String, mime_type: String) -> Self {
        let id = Oid::generate(format!("{}\0{}", repository_id, title).as_bytes());
        let created_at = crate::domain::now();
        Document {
            id,
            repository_id,
            owner,
            title,
            mime_type,
            file_size: None,
            current_version: None,
            content: Bytes::new(),
            created_at,
            updated_at: created_at,
        }
    }
}

impl Packable for Document {
    fn serialize(&self) -> Result<Bytes> {
        let mut record = Vec::new();
        writeln!(record, "id {}", self.id)?;
        writeln!(record, "repository {}", self.repository_id)?;
        writeln!(record, "owner {}", self.owner)?;
        writeln!(record, "title {}", self.title)?;
        writeln!(record, "mime {}", self.mime_type)?;
        if let Some(size) = self.file_size {
            writeln!(record, "size {}", size)?;
        }
        if let Some(current) = &self.current_version {
            writeln!(record, "current {}", current)?;
        }
        writeln!(record, "created {}", self.created_at.to_rfc3339())?;
        writeln!(record, "updated {}", self.updated_at.to_rfc3339())?;
        writeln!(record)?;
        record.write_all(&self.content)?;
        Ok(Bytes::from(record))
    }
}

impl Unpackable for Document {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        let separator = find_blank_line(&raw)
            .ok_or_else(|| Error::Corrupt("document record has no body".to_string()))?;
        let headers = std::str::from_utf8(&raw[..separator])
            .map_err(|e| Error::Corrupt(format!("document record is not utf-8: {}", e)))?;
        let content = Bytes::copy_from_slice(&raw[separator + 2..]);

        let mut fields = Fields::new(headers);
        let id = Oid::try_parse(strip_field(fields.next()?, "id")?.to_string())?;
        let repository_id = Oid::try_parse(strip_field(fields.next()?, "repository")?.to_string())?;
        let owner = strip_field(fields.next()?, "owner")?.to_string();
        let title = strip_field(fields.next()?, "title")?.to_string();
        let mime_type = strip_field(fields.next()?, "mime")?.to_string();

        let file_size = match fields.peek() {
            Some(line) if line.starts_with("size ") => Some(
                strip_field(fields.next()?, "size")?
                    .parse::<u64>()
                    .map_err(|e| Error::Corrupt(format!("invalid size: {}", e)))?,
            ),
            _ => None,
        };
        let current_version = match fields.peek() {
            Some(line) if line.starts_with("current ") => {
                Some(Oid::try_parse(strip_field(fields.next()?, "current")?.to_string())?)
            }
            _ => None,
        };

        let created_at = parse_timestamp(strip_field(fields.next()?, "created")?)?;
        let updated_at = parse_timestamp(strip_field(fields.next()?, "updated")?)?;

        Ok(Document {
            id,
            repository_id,
            owner,
            title,
            mime_type,
            file_size,
            current_version,
            content,
            created_at,
            updated_at,
        })
    }
}

/// Offset of the first `\n\n` separator in a record
pub(crate) fn find_blank_line(raw: &[u8]) -> Option<usize> {
    raw.windows(2).position(|pair| pair == b"\n\n")
}
