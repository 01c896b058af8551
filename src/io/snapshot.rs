//! Snapshot codec: the single durable blob holding index + metadata.
//!
//! Layout: 4-byte magic, u16 format version, u64 body length, 32-byte blake3
//! checksum of the body, then the bincode body. The body carries the chunker
//! config, the metadata tables, and the vector index (which embeds the chunk
//! id → position map), so everything the cross-component invariant depends on
//! is always written and loaded as one unit.
//!
//! Writes go through a temp file in the target directory followed by an
//! atomic rename, so a crash mid-write never leaves a partially written
//! snapshot in place.

use std::io::Write;
use std::path::Path;

use bincode::config::{self, Config};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::chunker::ChunkerConfig;
use crate::error::{Result, StoreError};
use crate::meta::MetadataStore;
use crate::vec::VectorIndex;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RGS\0";
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_SIZE: usize = 4 + 2 + 8 + 32;

/// Everything the store persists, deserialised as one unit.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub chunker: ChunkerConfig,
    pub meta: MetadataStore,
    pub index: VectorIndex,
}

/// Borrowed view with the same wire shape as [`Snapshot`], so flushing never
/// clones the tables.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    chunker: &'a ChunkerConfig,
    meta: &'a MetadataStore,
    index: &'a VectorIndex,
}

fn snapshot_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

/// Atomically replace the snapshot at `path`.
pub fn write(
    path: &Path,
    chunker: &ChunkerConfig,
    meta: &MetadataStore,
    index: &VectorIndex,
) -> Result<u64> {
    let body = bincode::serde::encode_to_vec(
        SnapshotRef {
            chunker,
            meta,
            index,
        },
        snapshot_config(),
    )?;
    let digest = blake3::hash(&body);

    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&SNAPSHOT_MAGIC);
    header[4..6].copy_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    header[6..14].copy_from_slice(&(body.len() as u64).to_le_bytes());
    header[14..46].copy_from_slice(digest.as_bytes());

    let dir = path.parent().ok_or_else(|| {
        StoreError::config(format!("snapshot path {} has no parent", path.display()))
    })?;
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&header)?;
    staged.write_all(&body)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| StoreError::Io(err.error))?;

    let total = (HEADER_SIZE + body.len()) as u64;
    tracing::debug!(
        snapshot.bytes = total,
        snapshot.path = %path.display(),
        "snapshot written"
    );
    Ok(total)
}

/// Load and validate the snapshot at `path`.
///
/// Any magic, version, length, or checksum mismatch surfaces as
/// `SnapshotCorrupt`; nothing is ever half-loaded.
pub fn read(path: &Path) -> Result<Snapshot> {
    let bytes = fs_err::read(path)?;
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::SnapshotCorrupt {
            reason: format!("file is {} bytes, shorter than the header", bytes.len()),
        });
    }

    if bytes[..4] != SNAPSHOT_MAGIC {
        return Err(StoreError::SnapshotCorrupt {
            reason: "bad magic".into(),
        });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(StoreError::SnapshotCorrupt {
            reason: format!("unsupported format version {version}"),
        });
    }
    let body_len = u64::from_le_bytes(
        bytes[6..14]
            .try_into()
            .map_err(|_| StoreError::SnapshotCorrupt {
                reason: "invalid length field".into(),
            })?,
    ) as usize;
    let body = &bytes[HEADER_SIZE..];
    if body.len() != body_len {
        return Err(StoreError::SnapshotCorrupt {
            reason: format!("body is {} bytes, header claims {body_len}", body.len()),
        });
    }
    let digest = blake3::hash(body);
    if digest.as_bytes() != &bytes[14..46] {
        return Err(StoreError::SnapshotCorrupt {
            reason: "body checksum mismatch".into(),
        });
    }

    let (snapshot, _) = bincode::serde::decode_from_slice(body, snapshot_config())?;
    Ok(snapshot)
}
