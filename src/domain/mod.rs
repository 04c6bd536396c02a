//! Entity records and value types of the versioning engine
//!
//! These are the tagged, exhaustively-matched record shapes validated at
//! the persistence boundary. Stores move them in and out of their backing
//! medium through the [`Packable`]/[`Unpackable`] traits; the engine only
//! ever sees the typed records.

pub mod author;
pub mod branch;
pub mod branch_name;
pub mod document;
pub mod oid;
pub mod repository;
pub mod version;

use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::BufRead;

pub use author::Author;
pub use branch::Branch;
pub use branch_name::BranchName;
pub use document::Document;
pub use oid::{Oid, fingerprint};
pub use repository::Repository;
pub use version::Version;

pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// Header lines of a serialized record, consumed field by field
pub(crate) struct Fields<'r> {
    lines: std::str::Lines<'r>,
}

impl<'r> Fields<'r> {
    pub(crate) fn new(headers: &'r str) -> Self {
        Fields {
            lines: headers.lines(),
        }
    }

    /// The next header line, or a corrupt-record error if the record ended early
    pub(crate) fn next(&mut self) -> Result<&'r str> {
        self.lines
            .next()
            .ok_or_else(|| Error::Corrupt("truncated record".to_string()))
    }

    /// Peek at the next header line without consuming it
    pub(crate) fn peek(&self) -> Option<&'r str> {
        self.lines.clone().next()
    }
}

/// Strip `"<key> "` from a record line, failing with a corrupt-record error
pub(crate) fn strip_field<'l>(line: &'l str, key: &str) -> Result<&'l str> {
    line.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| Error::Corrupt(format!("expected '{}' field, got '{}'", key, line)))
}

/// Parse an RFC 3339 timestamp from a record field
pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::FixedOffset>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::Corrupt(format!("invalid timestamp '{}': {}", value, e)))
}

/// Current wall-clock time with the local offset
///
/// All record timestamps come from here so ordering comparisons are
/// consistent across the engine.
pub(crate) fn now() -> chrono::DateTime<chrono::FixedOffset> {
    chrono::Local::now().fixed_offset()
}
