//! Error types for `ragstore-core`.

use crate::types::{ChunkId, DocumentId};

/// All the ways a store operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Invalid configuration or parameters.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Text extraction from raw bytes failed, or the input held no text.
    #[error("extraction failed: {reason}")]
    Extraction { reason: String },

    /// The embedding backend failed or returned a malformed batch.
    #[error("embedding failed: {reason}")]
    Embedding { reason: String },

    /// A vector's dimension disagrees with the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Vector index rejected an operation.
    #[error("index error: {reason}")]
    Index { reason: String },

    /// A cross-component invariant does not hold. Always a bug or corruption,
    /// never a recoverable condition.
    #[error("consistency violation: {reason}")]
    Consistency { reason: String },

    #[error("document not found: {id}")]
    DocumentNotFound { id: DocumentId },

    #[error("chunk not found: {id}")]
    ChunkNotFound { id: ChunkId },

    /// A chunk ordinal is already taken within its document.
    #[error("document {document_id} already holds a chunk at ordinal {ordinal}")]
    DuplicateOrdinal {
        document_id: DocumentId,
        ordinal: u32,
    },

    /// The snapshot failed a structural or checksum validation.
    #[error("snapshot corrupt: {reason}")]
    SnapshotCorrupt { reason: String },

    /// The store directory is locked by another process.
    #[error("store locked: {reason}")]
    Lock { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

impl StoreError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn index(reason: impl Into<String>) -> Self {
        Self::Index {
            reason: reason.into(),
        }
    }

    pub(crate) fn consistency(reason: impl Into<String>) -> Self {
        Self::Consistency {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
