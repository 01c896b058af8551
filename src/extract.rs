//! Text extraction seam.
//!
//! File-format parsing (PDF and friends) happens upstream of the store; the
//! core only consumes UTF-8 text. [`TextExtractor`] is the contract for that
//! upstream step, with a passthrough implementation for payloads that are
//! already plain text.

use crate::error::{Result, StoreError};

/// Turns raw file bytes into UTF-8 text for ingestion.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Passthrough extractor for payloads that are already UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|err| StoreError::Extraction {
                reason: format!("payload is not valid UTF-8: {err}"),
            })
    }
}
