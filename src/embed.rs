//! Embedding provider seam.
//!
//! The embedding model is a collaborator, not part of the core: anything that
//! can turn a batch of texts into fixed-dimension vectors plugs in through the
//! [`Embedder`] trait, bound at store construction. The crate ships one
//! offline implementation, [`HashingEmbedder`], a hashed bag-of-tokens model
//! that is deterministic and dependency-free while still giving overlapping
//! texts a higher cosine similarity than unrelated ones.

use crate::error::{Result, StoreError};

/// Dimension used when nothing else is configured. Matches the small
/// sentence-transformer models commonly paired with this kind of store.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Batch text-to-vector capability.
///
/// The dimension is fixed for the lifetime of the provider and must match the
/// dimension the store was created with. `embed` returns one vector per input
/// text, in input order.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic hashed bag-of-tokens embedder.
///
/// Tokens are lowercased alphanumeric runs. Each token is hashed with blake3
/// into a bucket and a sign, accumulated, then L2-normalised, so identical
/// texts embed identically and shared vocabulary produces positive cosine
/// similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(StoreError::config("embedding dimension must be positive"));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}
