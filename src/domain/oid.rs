//! Object identifiers and content fingerprints (SHA-1)
//!
//! Every entity in the engine is addressed by a 40-character hexadecimal
//! SHA-1 digest. Version ids are content-derived (the digest of the
//! serialized version record); repository and document ids are digests of
//! their identity material salted with creation time and a random nonce.
//!
//! The same digest primitive doubles as the content fingerprint used to
//! detect no-op commits and to validate patch preconditions.
//!
//! ## Format
//!
//! - Full: 40 hex characters
//! - Short: first 7 characters, for display

use crate::error::{Error, Result};
use fake::rand;
use sha1::{Digest, Sha1};
use std::path::PathBuf;

/// Length of a full object id in hex characters
pub const OID_LENGTH: usize = 40;

/// SHA-1 object identifier
///
/// A validated 40-character hexadecimal string. Used for repository,
/// branch, document, and version identities as well as content
/// fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    /// Parse and validate an object id from a string
    pub fn try_parse(id: String) -> Result<Self> {
        if id.len() != OID_LENGTH {
            return Err(Error::Validation(format!(
                "invalid object id length: {}",
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!("invalid object id: {}", id)));
        }
        Ok(Self(id))
    }

    /// Digest arbitrary bytes into an object id
    pub fn digest(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);
        let digest = hasher.finalize();
        Self(format!("{digest:x}"))
    }

    /// Mint a fresh id from identity material
    ///
    /// Salts the material with the current time and a random nonce so two
    /// entities created from identical material still get distinct ids.
    pub fn generate(material: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(material);
        hasher.update(
            chrono::Local::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_be_bytes(),
        );
        hasher.update(rand::random::<u64>().to_be_bytes());
        let digest = hasher.finalize();
        Self(format!("{digest:x}"))
    }

    /// Convert to a fan-out storage path, `XX/YYYY...`
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Abbreviated form, first 7 characters
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the content fingerprint of a document payload
///
/// Deterministic and pure. Equal payloads always produce equal
/// fingerprints; the engine relies on this for no-op commit detection and
/// patch precondition checks.
pub fn fingerprint(content: &[u8]) -> Oid {
    Oid::digest(content)
}
