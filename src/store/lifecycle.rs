//! Lifecycle management for creating and opening stores.
//!
//! Responsibilities:
//! - Take the OS lock on the store directory and hold it for the handle's lifetime.
//! - Bootstrap an empty snapshot on create, and load + validate it on open.
//! - Enforce that the bound embedder matches the persisted vector dimension.
//! - Flush the combined (metadata, index) state as one atomic snapshot.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chunker::ChunkerConfig;
use crate::embed::{DEFAULT_EMBEDDING_DIMENSION, Embedder};
use crate::error::{Result, StoreError};
use crate::io::lock::StoreLock;
use crate::io::snapshot;
use crate::meta::MetadataStore;
use crate::vec::VectorIndex;

const SNAPSHOT_FILE: &str = "store.rgs";
const LOCK_FILE: &str = "store.lock";

/// Creation-time parameters, fixed for the lifetime of the store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Embedding dimension shared by every vector in the index.
    pub dimension: usize,
    pub chunker: ChunkerConfig,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            chunker: ChunkerConfig::default(),
        }
    }
}

/// The combined mutable state guarded by the single-writer lock.
///
/// Mutations hold the write side across the whole persist-and-index phase, so
/// readers only ever observe states where the chunk/index bijection holds.
pub(crate) struct StoreState {
    pub(crate) meta: MetadataStore,
    pub(crate) index: VectorIndex,
}

/// Primary handle for a retrieval store.
///
/// Owns the directory lock, the chunking configuration, the bound embedder,
/// and the guarded (metadata, index) state. All mutating operations flush a
/// full snapshot before returning, so a reopened store always sees the last
/// completed operation.
pub struct RagStore {
    pub(crate) dir: PathBuf,
    pub(crate) snapshot_path: PathBuf,
    pub(crate) chunker: ChunkerConfig,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) state: RwLock<StoreState>,
    _lock: StoreLock,
}

// Manual impl: the embedder is a trait object, so derive is not an option.
impl fmt::Debug for RagStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagStore")
            .field("dir", &self.dir)
            .field("dimension", &self.embedder.dimension())
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl RagStore {
    /// Create a fresh store in `dir`, writing the initial empty snapshot.
    ///
    /// Fails if a snapshot already exists there, if the chunker parameters are
    /// invalid, or if `options.dimension` disagrees with the embedder.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        options: StoreOptions,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        options.chunker.validate()?;
        if embedder.dimension() != options.dimension {
            return Err(StoreError::Dimension {
                expected: options.dimension,
                actual: embedder.dimension(),
            });
        }

        fs_err::create_dir_all(dir)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        if snapshot_path.exists() {
            return Err(StoreError::config(format!(
                "store already exists at {}",
                snapshot_path.display()
            )));
        }
        let lock = StoreLock::acquire(&dir.join(LOCK_FILE))?;

        let state = StoreState {
            meta: MetadataStore::new(),
            index: VectorIndex::new(options.dimension)?,
        };
        snapshot::write(&snapshot_path, &options.chunker, &state.meta, &state.index)?;
        tracing::info!(
            store.dir = %dir.display(),
            store.dimension = options.dimension,
            "store created"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            snapshot_path,
            chunker: options.chunker,
            embedder,
            state: RwLock::new(state),
            _lock: lock,
        })
    }

    /// Open an existing store, loading index and metadata together from the
    /// persisted snapshot.
    pub fn open<P: AsRef<Path>>(dir: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dir = dir.as_ref();
        let lock = StoreLock::acquire(&dir.join(LOCK_FILE))?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);

        let loaded = snapshot::read(&snapshot_path)?;
        if embedder.dimension() != loaded.index.dimension() {
            return Err(StoreError::Dimension {
                expected: loaded.index.dimension(),
                actual: embedder.dimension(),
            });
        }

        tracing::info!(
            store.dir = %dir.display(),
            store.documents = loaded.meta.document_count(),
            store.chunks = loaded.meta.chunk_count(),
            "store opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            snapshot_path,
            chunker: loaded.chunker,
            embedder,
            state: RwLock::new(StoreState {
                meta: loaded.meta,
                index: loaded.index,
            }),
            _lock: lock,
        })
    }

    /// Open the store in `dir`, creating it with `options` if no snapshot
    /// exists yet.
    pub fn open_or_create<P: AsRef<Path>>(
        dir: P,
        options: StoreOptions,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.join(SNAPSHOT_FILE).exists() {
            Self::open(dir, embedder)
        } else {
            Self::create(dir, options, embedder)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        self.chunker
    }

    /// Write the current state out as a snapshot.
    ///
    /// Every mutating operation flushes internally; this is for explicit
    /// shutdown or periodic snapshotting by callers.
    pub fn flush(&self) -> Result<u64> {
        let state = self.read_state()?;
        self.flush_state(&state)
    }

    pub(crate) fn flush_state(&self, state: &StoreState) -> Result<u64> {
        snapshot::write(&self.snapshot_path, &self.chunker, &state.meta, &state.index)
    }

    /// Size of the persisted snapshot on disk.
    pub fn storage_bytes(&self) -> Result<u64> {
        Ok(fs_err::metadata(&self.snapshot_path)?.len())
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| StoreError::consistency("store state lock poisoned"))
    }

    pub(crate) fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| StoreError::consistency("store state lock poisoned"))
    }
}
