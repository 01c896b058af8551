//! Durable storage plumbing: snapshot codec and the process lock.

pub mod lock;
pub mod snapshot;

pub use lock::StoreLock;
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
