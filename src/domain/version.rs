//! Immutable version record
//!
//! Versions are the append-only history of a document. Once created a
//! version never changes; its id is the SHA-1 digest of the serialized
//! record, so the record is self-verifying.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! version <body-size>\0
//! repository <oid>
//! document <oid>
//! parent <oid>            (absent for a root version)
//! branch <name>
//! author <name> <email>
//! fingerprint <oid>
//! created <rfc3339>
//! message <byte-count>
//!
//! <message bytes><content bytes>
//! ```

use crate::domain::author::Author;
use crate::domain::branch_name::BranchName;
use crate::domain::document::find_blank_line;
use crate::domain::oid::{Oid, fingerprint};
use crate::domain::{Fields, Packable, Unpackable, parse_timestamp, strip_field};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{BufRead, Read, Write};

/// Immutable snapshot of a document's content at a point in history
///
/// `parent_version`, when present, always references a version of the same
/// document. Versions form a forest per document: cherry-pick and rebase
/// graft new versions with parents across branch lineages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: Oid,
    pub repository_id: Oid,
    pub document_id: Oid,
    pub content: Bytes,
    pub version_hash: Oid,
    pub commit_message: String,
    pub author: Author,
    pub parent_version: Option<Oid>,
    pub branch: BranchName,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl Version {
    /// Build a sealed version record
    ///
    /// Computes the content fingerprint and derives the id from the
    /// serialized record.
    pub fn new(
        repository_id: Oid,
        document_id: Oid,
        content: Bytes,
        commit_message: String,
        author: Author,
        parent_version: Option<Oid>,
        branch: BranchName,
    ) -> Result<Self> {
        let version_hash = fingerprint(&content);
        let version = Version {
            id: Oid::default(),
            repository_id,
            document_id,
            content,
            version_hash,
            commit_message,
            author,
            parent_version,
            branch,
            created_at: crate::domain::now(),
        };
        version.seal()
    }

    /// Derive the record id from the serialized bytes
    fn seal(mut self) -> Result<Self> {
        self.id = Oid::digest(&self.serialize()?);
        Ok(self)
    }

    /// First line of the commit message, for short-form display
    pub fn short_message(&self) -> String {
        self.commit_message.lines().next().unwrap_or("").to_string()
    }
}

impl Packable for Version {
    fn serialize(&self) -> Result<Bytes> {
        let mut headers = Vec::new();
        headers.push(format!("repository {}", self.repository_id));
        headers.push(format!("document {}", self.document_id));
        if let Some(parent) = &self.parent_version {
            headers.push(format!("parent {}", parent));
        }
        headers.push(format!("branch {}", self.branch));
        headers.push(format!("author {}", self.author.display_name()));
        headers.push(format!("fingerprint {}", self.version_hash));
        headers.push(format!("created {}", self.created_at.to_rfc3339()));
        headers.push(format!("message {}", self.commit_message.len()));

        let mut body = Vec::new();
        body.write_all(headers.join("\n").as_bytes())?;
        body.write_all(b"\n\n")?;
        body.write_all(self.commit_message.as_bytes())?;
        body.write_all(&self.content)?;

        let mut record = Vec::new();
        record.write_all(format!("version {}\0", body.len()).as_bytes())?;
        record.write_all(&body)?;
        Ok(Bytes::from(record))
    }
}

impl Unpackable for Version {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut header = Vec::new();
        reader.read_until(0, &mut header)?;
        let header = std::str::from_utf8(header.strip_suffix(b"\0").ok_or_else(|| {
            Error::Corrupt("version record has no size header".to_string())
        })?)
        .map_err(|e| Error::Corrupt(format!("version header is not utf-8: {}", e)))?;
        let body_size = strip_field(header, "version")?
            .parse::<usize>()
            .map_err(|e| Error::Corrupt(format!("invalid version size: {}", e)))?;

        let mut body = Vec::with_capacity(body_size);
        reader.read_to_end(&mut body)?;
        if body.len() != body_size {
            return Err(Error::Corrupt(format!(
                "version body size mismatch: expected {}, got {}",
                body_size,
                body.len()
            )));
        }

        let separator = find_blank_line(&body)
            .ok_or_else(|| Error::Corrupt("version record has no body".to_string()))?;
        let headers = std::str::from_utf8(&body[..separator])
            .map_err(|e| Error::Corrupt(format!("version record is not utf-8: {}", e)))?;
        let tail = &body[separator + 2..];

        let mut fields = Fields::new(headers);
        let repository_id = Oid::try_parse(strip_field(fields.next()?, "repository")?.to_string())?;
        let document_id = Oid::try_parse(strip_field(fields.next()?, "document")?.to_string())?;
        let parent_version = match fields.peek() {
            Some(line) if line.starts_with("parent ") => {
                Some(Oid::try_parse(strip_field(fields.next()?, "parent")?.to_string())?)
            }
            _ => None,
        };
        let branch = BranchName::try_parse(strip_field(fields.next()?, "branch")?)?;
        let author = Author::try_from(strip_field(fields.next()?, "author")?)?;
        let version_hash = Oid::try_parse(strip_field(fields.next()?, "fingerprint")?.to_string())?;
        let created_at = parse_timestamp(strip_field(fields.next()?, "created")?)?;
        let message_size = strip_field(fields.next()?, "message")?
            .parse::<usize>()
            .map_err(|e| Error::Corrupt(format!("invalid message size: {}", e)))?;

        if tail.len() < message_size {
            return Err(Error::Corrupt("version message is truncated".to_string()));
        }
        let commit_message = std::str::from_utf8(&tail[..message_size])
            .map_err(|e| Error::Corrupt(format!("version message is not utf-8: {}", e)))?
            .to_string();
        let content = Bytes::copy_from_slice(&tail[message_size..]);

        let version = Version {
            id: Oid::default(),
            repository_id,
            document_id,
            content,
            version_hash,
            commit_message,
            author,
            parent_version,
            branch,
            created_at,
        };
        version.seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn author() -> Author {
        Author::new("Ada Lovelace".to_string(), "ada@example.com".to_string())
    }

    #[rstest]
    fn record_round_trips(author: Author) {
        let version = Version::new(
            Oid::digest(b"repo"),
            Oid::digest(b"doc"),
            Bytes::from_static(b"hello world\n"),
            "add world\n\nlonger body".to_string(),
            author,
            Some(Oid::digest(b"parent")),
            BranchName::default_branch(),
        )
        .unwrap();

        let parsed =
            Version::deserialize(std::io::Cursor::new(version.serialize().unwrap())).unwrap();
        assert_eq!(parsed, version);
    }

    #[rstest]
    fn id_is_stable_across_reserialization(author: Author) {
        let version = Version::new(
            Oid::digest(b"repo"),
            Oid::digest(b"doc"),
            Bytes::from_static(b"hello"),
            "first".to_string(),
            author,
            None,
            BranchName::default_branch(),
        )
        .unwrap();

        let reparsed =
            Version::deserialize(std::io::Cursor::new(version.serialize().unwrap())).unwrap();
        assert_eq!(reparsed.id, version.id);
    }

    #[rstest]
    fn fingerprint_matches_content(author: Author) {
        let version = Version::new(
            Oid::digest(b"repo"),
            Oid::digest(b"doc"),
            Bytes::from_static(b"payload"),
            "msg".to_string(),
            author,
            None,
            BranchName::default_branch(),
        )
        .unwrap();
        assert_eq!(version.version_hash, fingerprint(b"payload"));
    }
}
