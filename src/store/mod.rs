//! The `RagStore` handle orchestrating lifecycle, mutations, and queries.

pub mod lifecycle;
pub mod mutation;
pub mod search;

pub use lifecycle::{RagStore, StoreOptions};
pub use mutation::IngestPhase;
