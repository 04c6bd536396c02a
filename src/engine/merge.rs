//! Merge: three-way reconciliation of divergent branches
//!
//! A content-level merge, not a replay. For every document touched on the
//! source branch since divergence the engine finds the merge base of the
//! two lineages and reconciles base, target, and source contents through
//! the diff engine. Overlapping edits surface as a merge conflict naming
//! the document and the conflicting line ranges; the engine never silently
//! prefers one side.

use crate::diff::{MergeOutcome, three_way_merge};
use crate::domain::{Author, BranchName, Oid, Version};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::{BranchUpdate, MutationBatch, PointerGuard, Store};
use std::collections::HashSet;

impl<S: Store> Engine<S> {
    /// Integrate `source_branch` into `target_branch`
    ///
    /// Per document: fast-forward when the target is unchanged since the
    /// merge base, skip when the source brings nothing new, three-way
    /// merge when both sides changed. Documents added independently on
    /// both branches merge through an empty base, so differing contents
    /// conflict over the whole file. The whole merge is one transaction.
    pub async fn merge(
        &self,
        repository_id: &Oid,
        source_branch: &str,
        target_branch: &str,
        author: &Author,
    ) -> Result<Vec<Version>> {
        let source = BranchName::try_parse(source_branch)?;
        let target = BranchName::try_parse(target_branch)?;
        if source == target {
            return Err(Error::Validation(
                "cannot merge a branch into itself".to_string(),
            ));
        }

        self.store().repository(repository_id).await?;
        self.store().branch(repository_id, &source).await?;
        let target_record = self.store().branch(repository_id, &target).await?;

        let source_versions = self
            .store()
            .versions_on_branch(repository_id, &source)
            .await?;

        // documents touched on the source branch, in order of first touch
        let mut touched: Vec<Oid> = Vec::new();
        let mut seen: HashSet<Oid> = HashSet::new();
        for version in &source_versions {
            if seen.insert(version.document_id.clone()) {
                touched.push(version.document_id.clone());
            }
        }

        let message = format!("Merged changes from {} into {}", source, target);
        let mut batch = MutationBatch::new();
        batch.guards.push(PointerGuard::new(
            repository_id.clone(),
            target.clone(),
            target_record.latest_commit.clone(),
        ));

        let mut merged: Vec<Version> = Vec::new();
        for document_id in touched {
            // cancellation point between per-document steps
            tokio::task::yield_now().await;

            let source_tip = self
                .resolve_on(&document_id, &source)
                .await?
                .ok_or_else(|| {
                    Error::Corrupt(format!(
                        "document {} has versions on {} but resolves to none",
                        document_id.short(),
                        source
                    ))
                })?;
            let target_tip = self.resolve_on(&document_id, &target).await?;

            let content = match &target_tip {
                // never seen on the target lineage: take the source content
                None => source_tip.content.clone(),
                Some(target_tip) => {
                    if target_tip.version_hash == source_tip.version_hash {
                        // both sides already agree
                        continue;
                    }
                    let base = self.merge_base_of(&source_tip, target_tip).await?;
                    match &base {
                        Some(base) if base.id == source_tip.id => continue,
                        Some(base) if base.id == target_tip.id => {
                            // target unchanged since divergence: fast-forward
                            source_tip.content.clone()
                        }
                        _ => {
                            let base_text = match &base {
                                Some(base) => Self::text_of(base)?,
                                None => String::new(),
                            };
                            let target_text = Self::text_of(target_tip)?;
                            let source_text = Self::text_of(&source_tip)?;
                            match three_way_merge(&base_text, &target_text, &source_text) {
                                MergeOutcome::Merged(combined) => {
                                    bytes::Bytes::from(combined)
                                }
                                MergeOutcome::Conflicts(ranges) => {
                                    return Err(Error::MergeConflict {
                                        document_id,
                                        ranges,
                                    });
                                }
                            }
                        }
                    }
                }
            };

            let version = Version::new(
                repository_id.clone(),
                document_id.clone(),
                content,
                message.clone(),
                author.clone(),
                target_tip.map(|tip| tip.id),
                target.clone(),
            )?;
            Self::stage(&mut batch, &version);
            merged.push(version);
        }

        if let Some(last) = merged.last() {
            batch.branches.push(BranchUpdate::new(
                repository_id.clone(),
                target,
                last.id.clone(),
            ));
            self.store().apply(batch).await?;
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{Author, BranchName};
    use crate::engine::Engine;
    use crate::error::Error;
    use crate::store::{MemoryStore, Store};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn author() -> Author {
        Author::new("Ada Lovelace".to_string(), "ada@example.com".to_string())
    }

    async fn diverged_repository() -> (
        Engine<MemoryStore>,
        crate::domain::Repository,
        crate::domain::Document,
    ) {
        let engine = Engine::new(Arc::new(MemoryStore::new()));
        let repository = engine
            .create_repository("notes", "", "ada", None)
            .await
            .unwrap();
        let document = engine
            .create_document(&repository.id, "a.txt", "text/plain", "ada")
            .await
            .unwrap();
        engine
            .commit(
                &document.id,
                "one\ntwo\nthree\nfour\nfive\n",
                "base",
                &author(),
                "main",
            )
            .await
            .unwrap();
        engine.create_branch(&repository.id, "feature").await.unwrap();
        (engine, repository, document)
    }

    #[tokio::test]
    async fn non_overlapping_edits_merge_cleanly() {
        let (engine, repository, document) = diverged_repository().await;

        // main edits the first line, feature edits the last
        engine
            .commit(
                &document.id,
                "ONE\ntwo\nthree\nfour\nfive\n",
                "main edit",
                &author(),
                "main",
            )
            .await
            .unwrap();
        engine
            .commit(
                &document.id,
                "one\ntwo\nthree\nfour\nFIVE\n",
                "feature edit",
                &author(),
                "feature",
            )
            .await
            .unwrap();

        let merged = engine
            .merge(&repository.id, "feature", "main", &author())
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].content,
            Bytes::from_static(b"ONE\ntwo\nthree\nfour\nFIVE\n")
        );

        let resolved = engine
            .resolve(&document.id, "main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, merged[0].id);
    }

    #[tokio::test]
    async fn overlapping_edits_conflict_and_apply_nothing() {
        let (engine, repository, document) = diverged_repository().await;

        engine
            .commit(
                &document.id,
                "one\nMAIN\nthree\nfour\nfive\n",
                "main edit",
                &author(),
                "main",
            )
            .await
            .unwrap();
        engine
            .commit(
                &document.id,
                "one\nFEATURE\nthree\nfour\nfive\n",
                "feature edit",
                &author(),
                "feature",
            )
            .await
            .unwrap();

        let before = engine
            .store()
            .versions_in_repository(&repository.id)
            .await
            .unwrap()
            .len();

        match engine
            .merge(&repository.id, "feature", "main", &author())
            .await
        {
            Err(Error::MergeConflict {
                document_id,
                ranges,
            }) => {
                assert_eq!(document_id, document.id);
                assert!(!ranges.is_empty());
            }
            other => panic!("expected a merge conflict, got {:?}", other),
        }

        // the failed merge left no partial state behind
        let after = engine
            .store()
            .versions_in_repository(&repository.id)
            .await
            .unwrap()
            .len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn fast_forwards_when_target_is_unchanged() {
        let (engine, repository, document) = diverged_repository().await;

        engine
            .commit(
                &document.id,
                "one\ntwo\nthree\nfour\nfive\nsix\n",
                "feature edit",
                &author(),
                "feature",
            )
            .await
            .unwrap();

        let merged = engine
            .merge(&repository.id, "feature", "main", &author())
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].content,
            Bytes::from_static(b"one\ntwo\nthree\nfour\nfive\nsix\n")
        );

        let main = engine
            .store()
            .branch(&repository.id, &BranchName::default_branch())
            .await
            .unwrap();
        assert_eq!(main.latest_commit, Some(merged[0].id.clone()));
    }

    #[tokio::test]
    async fn agreeing_branches_merge_nothing() {
        let (engine, repository, _) = diverged_repository().await;

        let merged = engine
            .merge(&repository.id, "feature", "main", &author())
            .await
            .unwrap();
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn document_only_on_source_is_carried_over() {
        let (engine, repository, _) = diverged_repository().await;
        let extra = engine
            .create_document(&repository.id, "b.txt", "text/plain", "ada")
            .await
            .unwrap();
        engine
            .commit(&extra.id, "fresh\n", "add b", &author(), "feature")
            .await
            .unwrap();

        let merged = engine
            .merge(&repository.id, "feature", "main", &author())
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].document_id, extra.id);
        assert_eq!(merged[0].content, Bytes::from_static(b"fresh\n"));
    }
}
