//! Queries, listings, and consistency checks for `RagStore`.
//!
//! Everything here takes the read side of the state lock, so reads run
//! concurrently with each other and always see a committed state.

use tracing::instrument;

use crate::error::{Result, StoreError};
use crate::store::lifecycle::{RagStore, StoreState};
use crate::types::{ChunkRecord, DocumentId, DocumentSummary, SearchHit, StoreStats};

impl RagStore {
    /// Rank the `top_k` most similar chunks for `query_text`.
    ///
    /// Hits come back in descending score order, ties broken by ascending
    /// chunk id. Returns fewer than `top_k` hits when the store holds fewer
    /// live chunks. Each hit is joined against chunk and document metadata;
    /// an index entry with no metadata record is a consistency violation, not
    /// an empty hit.
    #[instrument(skip_all, fields(query.top_k = top_k))]
    pub fn query(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(StoreError::config("top_k must be positive"));
        }
        let vectors = self.embedder.embed(&[query_text])?;
        let vector = vectors.into_iter().next().ok_or_else(|| StoreError::Embedding {
            reason: "embedder returned no vector for the query".into(),
        })?;

        let state = self.read_state()?;
        let scored = state.index.search(&vector, top_k)?;

        let mut hits = Vec::with_capacity(scored.len());
        for (rank, (chunk_id, score)) in scored.into_iter().enumerate() {
            let chunk = state.meta.chunk(chunk_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "live index entry for chunk {chunk_id} has no metadata record"
                ))
            })?;
            let document = state.meta.document(chunk.document_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "chunk {chunk_id} references missing document {}",
                    chunk.document_id
                ))
            })?;
            hits.push(SearchHit {
                rank: rank + 1,
                chunk_id,
                document_id: document.id,
                document_name: document.name.clone(),
                ordinal: chunk.ordinal,
                text: chunk.text.clone(),
                score,
            });
        }
        tracing::debug!(query.hits = hits.len(), "query served");
        Ok(hits)
    }

    /// Point-in-time listing of every document, oldest first.
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        Ok(self.read_state()?.meta.list_documents())
    }

    /// Aggregate counts plus the on-disk snapshot size.
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read_state()?;
        Ok(StoreStats {
            document_count: state.meta.document_count(),
            chunk_count: state.meta.chunk_count(),
            vector_dimension: state.index.dimension(),
            storage_bytes: self.storage_bytes()?,
        })
    }

    /// Reassemble the original document text from its chunks.
    ///
    /// Chunks are stitched in ordinal order; the overlapping prefix of each
    /// chunk is dropped using the recorded source spans, so the result is the
    /// exact ingested text.
    pub fn document_text(&self, document_id: DocumentId) -> Result<String> {
        let state = self.read_state()?;
        let document = state
            .meta
            .document(document_id)
            .ok_or(StoreError::DocumentNotFound { id: document_id })?;

        let mut chunks: Vec<&ChunkRecord> = Vec::with_capacity(document.chunk_ids.len());
        for chunk_id in &document.chunk_ids {
            let chunk = state.meta.chunk(*chunk_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "document {document_id} references missing chunk {chunk_id}"
                ))
            })?;
            chunks.push(chunk);
        }
        chunks.sort_by_key(|chunk| chunk.ordinal);

        let mut text = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.span.0);
            text.extend(chunk.text.chars().skip(skip));
            covered = covered.max(chunk.span.1);
        }
        Ok(text)
    }

    /// Check every cross-component invariant over the current state.
    ///
    /// Returns `Consistency` naming the first violation found:
    /// - every document chunk id resolves to a chunk that points back at it,
    ///   with ordinals unique within the document;
    /// - chunk records and live index entries are in bijection, and each
    ///   chunk's recorded position matches the index;
    /// - the chunk table size equals the sum of the per-document chunk lists.
    pub fn verify(&self) -> Result<()> {
        let state = self.read_state()?;
        verify_state(&state)
    }
}

pub(crate) fn verify_state(state: &StoreState) -> Result<()> {
    let mut listed_chunks = 0usize;
    for document in state.meta.documents() {
        listed_chunks += document.chunk_ids.len();
        let mut seen_ordinals = std::collections::BTreeSet::new();
        for chunk_id in &document.chunk_ids {
            let chunk = state.meta.chunk(*chunk_id).ok_or_else(|| {
                StoreError::consistency(format!(
                    "document {} references missing chunk {chunk_id}",
                    document.id
                ))
            })?;
            if chunk.document_id != document.id {
                return Err(StoreError::consistency(format!(
                    "chunk {chunk_id} belongs to {} but is listed by {}",
                    chunk.document_id, document.id
                )));
            }
            if !seen_ordinals.insert(chunk.ordinal) {
                return Err(StoreError::consistency(format!(
                    "document {} lists ordinal {} twice",
                    document.id, chunk.ordinal
                )));
            }
            match state.index.position_of(*chunk_id) {
                Some(position) if position == chunk.position => {}
                Some(position) => {
                    return Err(StoreError::consistency(format!(
                        "chunk {chunk_id} records position {} but the index holds it at {position}",
                        chunk.position
                    )));
                }
                None => {
                    return Err(StoreError::consistency(format!(
                        "chunk {chunk_id} has no live index entry"
                    )));
                }
            }
        }
    }

    if listed_chunks != state.meta.chunk_count() {
        return Err(StoreError::consistency(format!(
            "documents list {listed_chunks} chunks but the chunk table holds {}",
            state.meta.chunk_count()
        )));
    }
    if state.index.live_len() != state.meta.chunk_count() {
        return Err(StoreError::consistency(format!(
            "index holds {} live vectors but the chunk table holds {}",
            state.index.live_len(),
            state.meta.chunk_count()
        )));
    }
    for chunk_id in state.index.live_chunk_ids() {
        if state.meta.chunk(chunk_id).is_none() {
            return Err(StoreError::consistency(format!(
                "live index entry for chunk {chunk_id} has no metadata record"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::chunker::ChunkerConfig;
    use crate::embed::HashingEmbedder;
    use crate::error::StoreError;
    use crate::meta::MetadataStore;
    use crate::store::lifecycle::{RagStore, StoreOptions, StoreState};
    use crate::vec::VectorIndex;

    use super::verify_state;

    fn store_with(dir: &std::path::Path, chunker: ChunkerConfig) -> RagStore {
        let options = StoreOptions {
            dimension: 64,
            chunker,
        };
        let embedder = Arc::new(HashingEmbedder::new(64).expect("embedder"));
        RagStore::create(dir, options, embedder).expect("create")
    }

    #[test]
    fn query_rejects_zero_top_k() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        let err = store.query("anything", 0).expect_err("must fail");
        assert!(matches!(err, StoreError::Config { .. }));
    }

    #[test]
    fn query_on_empty_store_returns_nothing() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        assert!(store.query("anything", 5).expect("query").is_empty());
    }

    #[test]
    fn hits_are_ranked_and_joined() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        store
            .ingest("machine learning is a subset of artificial intelligence", "ml")
            .expect("ingest");
        store
            .ingest("baking bread requires flour water and yeast", "baking")
            .expect("ingest");

        let hits = store
            .query("artificial intelligence and machine learning", 2)
            .expect("query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
        assert_eq!(hits[0].document_name, "ml");
        assert!(hits[0].score > hits[1].score);
        for hit in &hits {
            assert!((-1.0..=1.0).contains(&hit.score));
        }
    }

    #[test]
    fn identical_text_scores_as_unit_similarity() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        let text = "the quick brown fox jumps over the lazy dog";
        store.ingest(text, "fox").expect("ingest");

        let hits = store.query(text, 1).expect("query");
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-5, "score {}", hits[0].score);
    }

    #[test]
    fn document_text_reconstructs_across_chunks() {
        let dir = tempdir().expect("tmp");
        let store = store_with(
            dir.path(),
            ChunkerConfig {
                chunk_size: 30,
                overlap: 10,
            },
        );
        let text = "The cats sat on the mat. The dogs ran in the park. Birds fly high above.";
        let doc = store.ingest(text, "animals").expect("ingest");

        assert!(
            store.stats().expect("stats").chunk_count >= 2,
            "text must span several chunks"
        );
        assert_eq!(store.document_text(doc).expect("text"), text);
    }

    #[test]
    fn document_text_requires_known_document() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        let err = store
            .document_text(uuid::Uuid::new_v4())
            .expect_err("must fail");
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[test]
    fn stats_track_counts_and_snapshot_size() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        let empty = store.stats().expect("stats");
        assert_eq!(empty.document_count, 0);
        assert_eq!(empty.chunk_count, 0);
        assert_eq!(empty.vector_dimension, 64);
        assert!(empty.storage_bytes > 0);

        store.ingest("a first small document", "a").expect("ingest");
        let one = store.stats().expect("stats");
        assert_eq!(one.document_count, 1);
        assert_eq!(one.chunk_count, 1);
        assert!(one.storage_bytes > empty.storage_bytes);
    }

    #[test]
    fn verify_passes_on_fresh_and_populated_store() {
        let dir = tempdir().expect("tmp");
        let store = store_with(dir.path(), ChunkerConfig::default());
        store.verify().expect("empty store consistent");
        store.ingest("some document", "doc").expect("ingest");
        store.verify().expect("populated store consistent");
    }

    /// One document, one chunk, chunk indexed and bound. The smallest state
    /// on which every invariant holds.
    fn healthy_state() -> StoreState {
        let mut meta = MetadataStore::new();
        let mut index = VectorIndex::new(2).expect("index");
        let doc = meta.add_document("doc");
        let chunk = meta.add_chunk(doc, 0, "text", (0, 4)).expect("chunk");
        let position = index.add(&[1.0, 0.0], chunk).expect("add");
        meta.set_position(chunk, position).expect("bind");
        StoreState { meta, index }
    }

    #[test]
    fn verify_detects_chunk_without_index_entry() {
        let mut state = healthy_state();
        verify_state(&state).expect("healthy");

        let chunk = state.index.live_chunk_ids().next().expect("one chunk");
        state.index.remove(chunk);
        let err = verify_state(&state).expect_err("must detect");
        assert!(matches!(err, StoreError::Consistency { .. }), "{err}");
    }

    #[test]
    fn verify_detects_stale_chunk_position() {
        let mut state = healthy_state();
        let chunk = state.index.live_chunk_ids().next().expect("one chunk");
        state.meta.set_position(chunk, 7).expect("rebind");
        let err = verify_state(&state).expect_err("must detect");
        assert!(matches!(err, StoreError::Consistency { .. }), "{err}");
    }

    #[test]
    fn verify_detects_index_entry_without_chunk() {
        let mut state = healthy_state();
        // A vector bound to a chunk id the metadata tables never saw.
        let position = state.index.add(&[0.0, 1.0], 999).expect("add");
        assert!(position > 0);
        let err = verify_state(&state).expect_err("must detect");
        assert!(matches!(err, StoreError::Consistency { .. }), "{err}");
    }
}
