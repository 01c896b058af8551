//! Public types exposed by the `ragstore-core` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an ingested document.
pub type DocumentId = Uuid;

/// Identifier of a chunk. Allocated from a monotonic counter so chunk ids form
/// a total order, which search uses as a deterministic tie-break.
pub type ChunkId = u64;

/// Durable record for an ingested document.
///
/// Immutable once committed except for `chunk_ids`; destroyed only by a
/// whole-document delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Chunk ids in ordinal order.
    pub chunk_ids: Vec<ChunkId>,
}

/// Durable record for a single chunk. Immutable once created, except for
/// `position`, which is reassigned when the vector index compacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub document_id: DocumentId,
    /// 0-based, strictly increasing within a document.
    pub ordinal: u32,
    pub text: String,
    /// Character span of this chunk in the source document text.
    pub span: (usize, usize),
    /// Handle of this chunk's vector in the index arena.
    pub position: usize,
}

/// Point-in-time view of a document, as returned by `list_documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub name: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub vector_dimension: usize,
    /// Size of the persisted snapshot on disk.
    pub storage_bytes: u64,
}

/// A single ranked query hit joined against chunk and document metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based rank within this result set.
    pub rank: usize,
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub document_name: String,
    pub ordinal: u32,
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}
