//! scriv: a lightweight version-control engine for text documents
//!
//! Documents live in repositories, organized into named branches with
//! append-only version history. The engine provides the commit algorithm,
//! branch integration (cherry-pick, rebase, three-way merge), line-level
//! diff and patches, and commit-graph retrieval, all over an injected
//! persistence backend.

pub mod diff;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use engine::Engine;
pub use error::{Error, Result};
