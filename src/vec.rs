//! Flat cosine-similarity vector index with tombstoned deletion.
//!
//! Vectors live in a flattened arena indexed by stable integer positions.
//! Deletions tombstone the entry instead of shifting data, so positions held
//! by concurrent readers stay valid; a compaction pass rebuilds the arena
//! once the tombstone ratio crosses a threshold and hands back the position
//! remap so the metadata tables can follow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::types::ChunkId;

/// Tombstoned share of the arena above which a delete triggers compaction.
pub const COMPACT_TOMBSTONE_RATIO: f32 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk_id: ChunkId,
    tombstoned: bool,
}

/// Similarity-searchable index over fixed-dimension vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    /// Flattened arena; row `p` occupies `[p * dimension, (p + 1) * dimension)`.
    vectors: Vec<f32>,
    /// Parallel to arena rows, including tombstoned ones.
    entries: Vec<IndexEntry>,
    /// chunk id → arena position, live entries only.
    positions: BTreeMap<ChunkId, usize>,
    tombstones: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(StoreError::config("vector dimension must be positive"));
        }
        Ok(Self {
            dimension,
            vectors: Vec::new(),
            entries: Vec::new(),
            positions: BTreeMap::new(),
            tombstones: 0,
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total entries, tombstoned included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn live_len(&self) -> usize {
        self.entries.len() - self.tombstones
    }

    #[must_use]
    pub fn contains(&self, chunk_id: ChunkId) -> bool {
        self.positions.contains_key(&chunk_id)
    }

    #[must_use]
    pub fn position_of(&self, chunk_id: ChunkId) -> Option<usize> {
        self.positions.get(&chunk_id).copied()
    }

    /// Chunk ids of live entries, in ascending order.
    pub fn live_chunk_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.positions.keys().copied()
    }

    /// Append a vector and bind it to `chunk_id`, returning its stable position.
    pub fn add(&mut self, vector: &[f32], chunk_id: ChunkId) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(StoreError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.positions.contains_key(&chunk_id) {
            return Err(StoreError::index(format!(
                "chunk {chunk_id} is already indexed"
            )));
        }

        let position = self.entries.len();
        self.vectors.extend_from_slice(vector);
        self.entries.push(IndexEntry {
            chunk_id,
            tombstoned: false,
        });
        self.positions.insert(chunk_id, position);
        Ok(position)
    }

    /// Reverse a logical removal, re-binding `chunk_id` at `position`.
    ///
    /// Returns `false` unless `position` holds a tombstoned entry for exactly
    /// this chunk id, so a restore can never resurrect the wrong vector.
    pub fn restore(&mut self, chunk_id: ChunkId, position: usize) -> bool {
        let Some(entry) = self.entries.get_mut(position) else {
            return false;
        };
        if !entry.tombstoned || entry.chunk_id != chunk_id {
            return false;
        }
        entry.tombstoned = false;
        self.tombstones -= 1;
        self.positions.insert(chunk_id, position);
        true
    }

    /// Logically remove `chunk_id`. Returns `false` if it is not live.
    pub fn remove(&mut self, chunk_id: ChunkId) -> bool {
        let Some(position) = self.positions.remove(&chunk_id) else {
            return false;
        };
        self.entries[position].tombstoned = true;
        self.tombstones += 1;
        true
    }

    /// Top-`k` live entries by cosine similarity, sorted descending by score
    /// with ties broken by ascending chunk id.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if vector.len() != self.dimension {
            return Err(StoreError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.tombstoned)
            .map(|(position, entry)| {
                let row = &self.vectors[position * self.dimension..(position + 1) * self.dimension];
                (entry.chunk_id, cosine_similarity(vector, row))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    #[must_use]
    pub fn should_compact(&self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.tombstones as f32 / self.entries.len() as f32 > COMPACT_TOMBSTONE_RATIO
    }

    /// Rebuild the arena with live vectors only, reassigning positions.
    ///
    /// Returns the chunk id → new position remap so callers can update any
    /// state that recorded the old positions. Relative order of live entries
    /// is preserved.
    pub fn compact(&mut self) -> BTreeMap<ChunkId, usize> {
        let before = self.entries.len();
        let mut vectors = Vec::with_capacity(self.live_len() * self.dimension);
        let mut entries = Vec::with_capacity(self.live_len());
        let mut remap = BTreeMap::new();

        for (position, entry) in self.entries.iter().enumerate() {
            if entry.tombstoned {
                continue;
            }
            let new_position = entries.len();
            vectors.extend_from_slice(
                &self.vectors[position * self.dimension..(position + 1) * self.dimension],
            );
            entries.push(entry.clone());
            remap.insert(entry.chunk_id, new_position);
        }

        self.vectors = vectors;
        self.entries = entries;
        self.positions = remap.clone();
        self.tombstones = 0;

        tracing::info!(
            index.entries_before = before,
            index.entries_after = self.entries.len(),
            "compacted vector index"
        );
        remap
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
