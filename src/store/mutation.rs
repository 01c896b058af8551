//! Ingestion and deletion for `RagStore`.
//!
//! Owns the ingest pipeline: text → chunks → embeddings → metadata/index
//! writes → snapshot flush. The embedding call runs before the write lock is
//! taken so the external suspension point never blocks concurrent readers;
//! the lock is held only for the persist-and-index phase. Any failure inside
//! that phase rolls back every chunk persisted for the attempt before the
//! error surfaces, so a document never partially exists.

use tracing::instrument;

use crate::chunker::chunk_text;
use crate::error::{Result, StoreError};
use crate::extract::TextExtractor;
use crate::store::lifecycle::{RagStore, StoreState};
use crate::types::{ChunkId, ChunkRecord, DocumentId};

/// Phases of the per-document ingestion pipeline, in order. `Failed` is
/// reachable from any of them and always runs the rollback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    Pending,
    Chunked,
    Embedded,
    Indexed,
    Failed,
}

impl RagStore {
    /// Ingest one document: chunk, embed, persist, index, commit.
    ///
    /// Returns the new document id. On any embedder or index failure every
    /// chunk and vector already persisted for this attempt is removed before
    /// the error is reported.
    #[instrument(skip_all, fields(document.name = %name))]
    pub fn ingest(&self, raw_text: &str, name: &str) -> Result<DocumentId> {
        let pieces = chunk_text(raw_text, &self.chunker)?;
        tracing::debug!(
            phase = ?IngestPhase::Chunked,
            chunks = pieces.len(),
            "document chunked"
        );
        if pieces.is_empty() {
            return Err(StoreError::Extraction {
                reason: "document contains no text".into(),
            });
        }

        // External suspension point, deliberately outside the write lock.
        let texts: Vec<&str> = pieces.iter().map(|piece| piece.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != pieces.len() {
            return Err(StoreError::Embedding {
                reason: format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    pieces.len()
                ),
            });
        }
        tracing::debug!(phase = ?IngestPhase::Embedded, "chunk batch embedded");

        let mut state = self.write_state()?;
        let document_id = state.meta.add_document(name);
        let mut persisted: Vec<ChunkId> = Vec::with_capacity(pieces.len());

        for (ordinal, (piece, vector)) in (0u32..).zip(pieces.iter().zip(&vectors)) {
            let chunk_id =
                match state
                    .meta
                    .add_chunk(document_id, ordinal, &piece.text, piece.span)
                {
                    Ok(id) => id,
                    Err(err) => {
                        self.rollback_ingest(&mut state, document_id, &persisted);
                        return Err(err);
                    }
                };
            persisted.push(chunk_id);

            let position = match state.index.add(vector, chunk_id) {
                Ok(position) => position,
                Err(err) => {
                    self.rollback_ingest(&mut state, document_id, &persisted);
                    return Err(err);
                }
            };
            if let Err(err) = state.meta.set_position(chunk_id, position) {
                self.rollback_ingest(&mut state, document_id, &persisted);
                return Err(err);
            }
        }

        // The document record becomes durable together with its chunks.
        if let Err(err) = self.flush_state(&state) {
            self.rollback_ingest(&mut state, document_id, &persisted);
            return Err(err);
        }

        tracing::info!(
            phase = ?IngestPhase::Indexed,
            document = %document_id,
            chunks = persisted.len(),
            "document ingested"
        );
        Ok(document_id)
    }

    /// Run `extractor` over raw file bytes and ingest the resulting text.
    pub fn ingest_with_extractor(
        &self,
        bytes: &[u8],
        name: &str,
        extractor: &dyn TextExtractor,
    ) -> Result<DocumentId> {
        let text = extractor.extract(bytes)?;
        self.ingest(&text, name)
    }

    /// Delete a document and all of its chunks.
    ///
    /// Tombstones every vector first, then removes the metadata records, then
    /// commits the snapshot; the compaction check runs only once the delete is
    /// durable. All under one write-lock hold, so readers observe either the
    /// whole document or none of it. A failed commit restores the in-memory
    /// state before the error surfaces, so an errored delete changes nothing.
    #[instrument(skip(self), fields(document.id = %document_id))]
    pub fn delete(&self, document_id: DocumentId) -> Result<()> {
        let mut state = self.write_state()?;
        let chunk_ids = {
            let document = state
                .meta
                .document(document_id)
                .ok_or(StoreError::DocumentNotFound { id: document_id })?;
            document.chunk_ids.clone()
        };

        // Validate the bijection up front, capturing the records and index
        // positions needed to undo the delete if the commit fails. A
        // violation here leaves the store untouched instead of half-deleted.
        let mut saved: Vec<(ChunkRecord, usize)> = Vec::with_capacity(chunk_ids.len());
        for chunk_id in &chunk_ids {
            let position = state.index.position_of(*chunk_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "chunk {chunk_id} of document {document_id} has no live index entry"
                ))
            })?;
            let chunk = state.meta.chunk(*chunk_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "document {document_id} references missing chunk {chunk_id}"
                ))
            })?;
            saved.push((chunk.clone(), position));
        }

        for chunk_id in &chunk_ids {
            state.index.remove(*chunk_id);
        }
        let document = state.meta.delete_document(document_id)?;

        if let Err(err) = self.flush_state(&state) {
            tracing::warn!(
                document = %document_id,
                error = %err,
                "delete commit failed, restoring document"
            );
            let mut chunks = Vec::with_capacity(saved.len());
            for (chunk, position) in saved {
                state.index.restore(chunk.id, position);
                chunks.push(chunk);
            }
            state.meta.restore_document(document, chunks);
            return Err(err);
        }

        if state.index.should_compact() {
            let remap = state.index.compact();
            state.meta.apply_remap(&remap)?;
            // The delete is already durable; if this flush fails the disk
            // keeps the consistent pre-compaction state and the next
            // successful flush carries the compaction.
            if let Err(err) = self.flush_state(&state) {
                tracing::warn!(error = %err, "could not flush compacted index");
            }
        }

        tracing::info!(
            document = %document_id,
            chunks = chunk_ids.len(),
            "document deleted"
        );
        Ok(())
    }

    /// Undo everything persisted for a failed ingest attempt: tombstone the
    /// vectors, drop the metadata records, and flush the restored state.
    fn rollback_ingest(
        &self,
        state: &mut StoreState,
        document_id: DocumentId,
        persisted: &[ChunkId],
    ) {
        tracing::warn!(
            phase = ?IngestPhase::Failed,
            document = %document_id,
            chunks = persisted.len(),
            "rolling back partial ingest"
        );
        for chunk_id in persisted.iter().rev() {
            state.index.remove(*chunk_id);
        }
        if let Err(err) = state.meta.delete_document(document_id) {
            tracing::error!(error = %err, "rollback could not remove document metadata");
        }
        if let Err(err) = self.flush_state(state) {
            tracing::error!(error = %err, "rollback could not flush restored state");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::chunker::ChunkerConfig;
    use crate::embed::{Embedder, HashingEmbedder};
    use crate::error::{Result, StoreError};
    use crate::store::lifecycle::{RagStore, StoreOptions};

    fn small_store(dir: &std::path::Path) -> RagStore {
        let options = StoreOptions {
            dimension: 16,
            chunker: ChunkerConfig::default(),
        };
        let embedder = Arc::new(HashingEmbedder::new(16).expect("embedder"));
        RagStore::create(dir, options, embedder).expect("create")
    }

    /// Reports one dimension but emits vectors one element short, so the
    /// failure surfaces at indexing time, after metadata was persisted.
    struct ShortVectorEmbedder;

    impl Embedder for ShortVectorEmbedder {
        fn dimension(&self) -> usize {
            16
        }

        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; 15]).collect())
        }
    }

    #[test]
    fn ingest_assigns_sequential_ordinals() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        let text = "one two three. ".repeat(200);
        let doc = store.ingest(&text, "long").expect("ingest");

        let stats = store.stats().expect("stats");
        assert!(stats.chunk_count > 1, "long text must produce many chunks");
        assert_eq!(store.document_text(doc).expect("text"), text);
        store.verify().expect("consistent");
    }

    #[test]
    fn empty_text_is_rejected() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        let err = store.ingest("", "empty").expect_err("must fail");
        assert!(matches!(err, StoreError::Extraction { .. }));
        assert_eq!(store.stats().expect("stats").document_count, 0);
    }

    #[test]
    fn failed_ingest_rolls_back_completely() {
        let dir = tempdir().expect("tmp");
        let options = StoreOptions {
            dimension: 16,
            chunker: ChunkerConfig::default(),
        };
        let store =
            RagStore::create(dir.path(), options, Arc::new(ShortVectorEmbedder)).expect("create");

        let err = store.ingest("some document text", "bad").expect_err("must fail");
        assert!(matches!(err, StoreError::Dimension { .. }), "{err}");

        let stats = store.stats().expect("stats");
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.chunk_count, 0);
        assert!(store.list_documents().expect("list").is_empty());
        store.verify().expect("rollback must restore consistency");
    }

    #[test]
    fn delete_removes_document_and_chunks() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        let kept = store.ingest("the kept document", "kept").expect("ingest");
        let doomed = store.ingest("the doomed document", "doomed").expect("ingest");

        store.delete(doomed).expect("delete");
        let listing = store.list_documents().expect("list");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, kept);

        let err = store.delete(doomed).expect_err("second delete must fail");
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
        store.verify().expect("consistent");
    }

    #[test]
    fn delete_past_threshold_compacts_and_remaps() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        // Short texts, one chunk each.
        let docs: Vec<_> = (0..4)
            .map(|i| {
                store
                    .ingest(&format!("tiny document number {i}"), &format!("doc-{i}"))
                    .expect("ingest")
            })
            .collect();

        // 1 of 4 tombstoned crosses the 20% ratio, so this delete compacts.
        store.delete(docs[1]).expect("delete");
        store.verify().expect("positions must follow the remap");

        let hits = store.query("tiny document", 10).expect("query");
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|hit| hit.document_id != docs[1]));
    }

    #[test]
    fn failed_delete_commit_leaves_document_intact() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        let doc = store
            .ingest("a document that must survive", "survivor")
            .expect("ingest");

        // Block the snapshot path so the atomic replace cannot land.
        let snapshot = dir.path().join("store.rgs");
        std::fs::remove_file(&snapshot).expect("remove snapshot");
        std::fs::create_dir(&snapshot).expect("block snapshot path");

        let err = store.delete(doc).expect_err("commit must fail");
        assert!(matches!(err, StoreError::Io(_)), "{err}");

        // The errored delete must not have changed what readers see.
        let listing = store.list_documents().expect("list");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, doc);
        let hits = store.query("document that must survive", 5).expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc);
        store.verify().expect("consistent after failed delete");

        // Once flushing is possible again the same delete goes through.
        std::fs::remove_dir(&snapshot).expect("unblock snapshot path");
        store.delete(doc).expect("delete");
        assert!(store.list_documents().expect("list").is_empty());
    }

    #[test]
    fn extractor_failures_leave_store_unchanged() {
        let dir = tempdir().expect("tmp");
        let store = small_store(dir.path());
        let err = store
            .ingest_with_extractor(&[0xFF, 0xFE], "binary", &crate::extract::PlainTextExtractor)
            .expect_err("must fail");
        assert!(matches!(err, StoreError::Extraction { .. }));
        assert_eq!(store.stats().expect("stats").document_count, 0);
    }
}
