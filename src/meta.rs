//! Durable document and chunk metadata tables.
//!
//! `MetadataStore` owns the document and chunk records plus the chunk id
//! allocator. It is a plain in-memory structure serialised wholesale into the
//! snapshot; cross-component consistency with the vector index is enforced by
//! the store orchestration, not here.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{ChunkId, ChunkRecord, DocumentId, DocumentRecord, DocumentSummary};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataStore {
    documents: BTreeMap<DocumentId, DocumentRecord>,
    chunks: BTreeMap<ChunkId, ChunkRecord>,
    next_chunk_id: ChunkId,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document record with an empty chunk list and return its id.
    pub fn add_document(&mut self, name: &str) -> DocumentId {
        let id = Uuid::new_v4();
        self.documents.insert(
            id,
            DocumentRecord {
                id,
                name: name.to_owned(),
                created_at: Utc::now(),
                chunk_ids: Vec::new(),
            },
        );
        id
    }

    /// Persist a chunk for `document_id` and append it to the document's
    /// chunk list in the same step, keeping the chunk-count identity intact.
    ///
    /// Fails with `DuplicateOrdinal` if the ordinal is already taken and
    /// `DocumentNotFound` if the document record does not exist. The index
    /// position starts unset; callers bind it via [`set_position`](Self::set_position)
    /// once the vector is indexed.
    pub fn add_chunk(
        &mut self,
        document_id: DocumentId,
        ordinal: u32,
        text: &str,
        span: (usize, usize),
    ) -> Result<ChunkId> {
        let document = self
            .documents
            .get_mut(&document_id)
            .ok_or(StoreError::DocumentNotFound { id: document_id })?;

        let taken = document
            .chunk_ids
            .iter()
            .filter_map(|id| self.chunks.get(id))
            .any(|chunk| chunk.ordinal == ordinal);
        if taken {
            return Err(StoreError::DuplicateOrdinal {
                document_id,
                ordinal,
            });
        }

        let id = self.next_chunk_id;
        self.next_chunk_id += 1;
        document.chunk_ids.push(id);
        self.chunks.insert(
            id,
            ChunkRecord {
                id,
                document_id,
                ordinal,
                text: text.to_owned(),
                span,
                position: usize::MAX,
            },
        );
        Ok(id)
    }

    /// Bind a chunk to its vector's index position.
    pub fn set_position(&mut self, chunk_id: ChunkId, position: usize) -> Result<()> {
        let chunk = self
            .chunks
            .get_mut(&chunk_id)
            .ok_or(StoreError::ChunkNotFound { id: chunk_id })?;
        chunk.position = position;
        Ok(())
    }

    /// Apply an index compaction remap to every affected chunk record.
    pub fn apply_remap(&mut self, remap: &BTreeMap<ChunkId, usize>) -> Result<()> {
        for (chunk_id, position) in remap {
            self.set_position(*chunk_id, *position)?;
        }
        Ok(())
    }

    /// Remove the document and every one of its chunk records as one unit.
    ///
    /// Validates up front that every referenced chunk exists, so either the
    /// whole delete applies or nothing does. Returns the removed record.
    pub fn delete_document(&mut self, document_id: DocumentId) -> Result<DocumentRecord> {
        let document = self
            .documents
            .get(&document_id)
            .ok_or(StoreError::DocumentNotFound { id: document_id })?;

        for chunk_id in &document.chunk_ids {
            if !self.chunks.contains_key(chunk_id) {
                return Err(StoreError::consistency(format!(
                    "document {document_id} references missing chunk {chunk_id}"
                )));
            }
        }

        let document = self
            .documents
            .remove(&document_id)
            .ok_or(StoreError::DocumentNotFound { id: document_id })?;
        for chunk_id in &document.chunk_ids {
            self.chunks.remove(chunk_id);
        }
        Ok(document)
    }

    /// Re-insert a previously removed document and its chunk records, undoing
    /// a [`delete_document`](Self::delete_document).
    pub fn restore_document(&mut self, document: DocumentRecord, chunks: Vec<ChunkRecord>) {
        for chunk in chunks {
            self.chunks.insert(chunk.id, chunk);
        }
        self.documents.insert(document.id, document);
    }

    #[must_use]
    pub fn document(&self, id: DocumentId) -> Option<&DocumentRecord> {
        self.documents.get(&id)
    }

    #[must_use]
    pub fn chunk(&self, id: ChunkId) -> Option<&ChunkRecord> {
        self.chunks.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    /// Consistent point-in-time listing, oldest first.
    #[must_use]
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        let mut summaries: Vec<DocumentSummary> = self
            .documents
            .values()
            .map(|document| DocumentSummary {
                id: document.id,
                name: document.name.clone(),
                chunk_count: document.chunk_ids.len(),
                created_at: document.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
