#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: self-documenting internals don't need exhaustive docs;
// public APIs still get proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: the few numeric casts here are bounded by real-world sizes
// (chunk counts, arena rows); try_into everywhere would only add noise.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
//
// Style/complexity: orchestration paths (ingest, verify) are naturally long;
// splitting them would hurt readability.
#![allow(clippy::too_many_lines)]
#![allow(clippy::similar_names)]
// e.g. chunk_id, document_id are intentionally similar

//! # ragstore-core
//!
//! An embeddable document retrieval store: boundary-aware chunking, a
//! cosine-similarity vector index, durable document/chunk metadata, and a
//! crash-safe single-file snapshot, behind one handle.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragstore_core::{HashingEmbedder, RagStore, StoreOptions};
//!
//! # fn main() -> ragstore_core::Result<()> {
//! let embedder = Arc::new(HashingEmbedder::default());
//! let store = RagStore::open_or_create("./my-store", StoreOptions::default(), embedder)?;
//!
//! let doc = store.ingest("Rust is a systems programming language.", "notes")?;
//! let hits = store.query("systems programming", 5)?;
//! for hit in &hits {
//!     println!("{:.3}  {}", hit.score, hit.text);
//! }
//! store.delete(doc)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - A document is visible either with all of its chunks indexed or not at
//!   all; failed ingests roll back completely.
//! - Every mutation flushes an atomically replaced, checksummed snapshot, so
//!   a reopened store always reflects the last completed operation.
//! - One writer at a time, readers never block each other; a directory lock
//!   keeps a second process out entirely.

pub mod chunker;
pub mod embed;
pub mod error;
pub mod extract;
pub mod io;
pub mod meta;
pub mod store;
pub mod types;
pub mod vec;

pub use chunker::{
    ChunkPiece, ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, chunk_text, reconstruct,
};
pub use embed::{DEFAULT_EMBEDDING_DIMENSION, Embedder, HashingEmbedder};
pub use error::{Result, StoreError};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use io::{Snapshot, StoreLock};
pub use meta::MetadataStore;
pub use store::{IngestPhase, RagStore, StoreOptions};
pub use types::{
    ChunkId, ChunkRecord, DocumentId, DocumentRecord, DocumentSummary, SearchHit, StoreStats,
};
pub use vec::VectorIndex;

/// Version of this crate.
pub const RAGSTORE_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
