//! Common ancestor search over version parent chains
//!
//! Versions carry a single nullable parent, so the ancestry of any version
//! is a chain. The most recent common ancestor of two versions is found by
//! collecting one chain and walking the other back until a shared id turns
//! up, or concluding the lineages never met (documents added independently
//! on two branches).

use crate::domain::{Oid, Version};
use crate::engine::Engine;
use crate::error::Result;
use crate::store::Store;
use std::collections::HashSet;

impl<S: Store> Engine<S> {
    /// Most recent common ancestor of two versions, if their lineages meet
    pub async fn merge_base(&self, left: &Oid, right: &Oid) -> Result<Option<Version>> {
        let left = self.store().version(left).await?;
        let right = self.store().version(right).await?;
        self.merge_base_of(&left, &right).await
    }

    pub(crate) async fn merge_base_of(
        &self,
        left: &Version,
        right: &Version,
    ) -> Result<Option<Version>> {
        if left.document_id != right.document_id {
            return Ok(None);
        }

        let mut left_chain = HashSet::new();
        let mut cursor = Some(left.clone());
        while let Some(version) = cursor {
            left_chain.insert(version.id.clone());
            cursor = match &version.parent_version {
                Some(parent) => Some(self.store().version(parent).await?),
                None => None,
            };
        }

        let mut walked = HashSet::new();
        let mut cursor = Some(right.clone());
        while let Some(version) = cursor {
            if left_chain.contains(&version.id) {
                return Ok(Some(version));
            }
            if !walked.insert(version.id.clone()) {
                break;
            }
            cursor = match &version.parent_version {
                Some(parent) => Some(self.store().version(parent).await?),
                None => None,
            };
        }
        Ok(None)
    }
}
