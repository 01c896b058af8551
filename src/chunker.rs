//! Boundary-aware overlapping text chunking.
//!
//! Splits UTF-8 text into a deterministic, ordered sequence of chunks such that
//! concatenating the chunks while discarding the `overlap`-character prefix of
//! every chunk after the first reconstructs the input exactly. Cut points are
//! searched backward from the window end within a bounded lookback so chunks
//! tend to end on sentence or word boundaries instead of mid-token.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Fraction of `chunk_size` scanned backward for a natural cut point.
const LOOKBACK_FRACTION: usize = 5; // 20%

const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

/// Chunking parameters, fixed per store at creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(StoreError::config("chunk_size must be positive"));
        }
        if self.overlap == 0 {
            return Err(StoreError::config("overlap must be positive"));
        }
        if self.overlap >= self.chunk_size {
            return Err(StoreError::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// One chunk of source text plus its character span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub text: String,
    /// Half-open `[start, end)` character offsets into the source text.
    pub span: (usize, usize),
}

/// Split `text` into overlapping chunks.
///
/// Empty input yields zero chunks; input shorter than `chunk_size` yields
/// exactly one. Spans are character offsets, so multi-byte characters are
/// never split. Deterministic for identical input and config.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Result<Vec<ChunkPiece>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < len {
        let hard_end = (start + config.chunk_size).min(len);
        let end = if hard_end < len {
            find_cut(&chars, start, hard_end, config)
        } else {
            hard_end
        };

        pieces.push(ChunkPiece {
            text: chars[start..end].iter().collect(),
            span: (start, end),
        });

        if end >= len {
            break;
        }
        // The next window re-reads the last `overlap` characters.
        start = end - config.overlap;
    }

    tracing::debug!(
        chunker.input_chars = len,
        chunker.chunks = pieces.len(),
        chunker.chunk_size = config.chunk_size,
        chunker.overlap = config.overlap,
        "chunked text"
    );

    Ok(pieces)
}

/// Pick a cut point in `(window_lo, hard_end]`, preferring sentence
/// terminators over whitespace, falling back to a hard cut at `hard_end`.
///
/// The window never reaches back past `start + overlap + 1`, so every cut
/// advances the sliding window and the reconstruction contract holds.
fn find_cut(chars: &[char], start: usize, hard_end: usize, config: &ChunkerConfig) -> usize {
    let lookback = (config.chunk_size / LOOKBACK_FRACTION).max(1);
    let window_lo = hard_end
        .saturating_sub(lookback)
        .max(start + config.overlap + 1);
    if window_lo > hard_end {
        return hard_end;
    }

    for cut in (window_lo..=hard_end).rev() {
        if SENTENCE_TERMINATORS.contains(&chars[cut - 1]) {
            return cut;
        }
    }
    for cut in (window_lo..=hard_end).rev() {
        if chars[cut - 1].is_whitespace() {
            return cut;
        }
    }
    hard_end
}

/// Reconstruct the source text from ordered chunks by discarding the overlap
/// prefix of every chunk after the first, using the recorded spans.
pub fn reconstruct(pieces: &[ChunkPiece]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for piece in pieces {
        let skip = covered.saturating_sub(piece.span.0);
        out.extend(piece.text.chars().skip(skip));
        covered = covered.max(piece.span.1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        for (size, overlap) in [(0, 1), (10, 0), (10, 10), (10, 20)] {
            let err = chunk_text("hello world", &config(size, overlap)).expect_err("must fail");
            assert!(matches!(err, StoreError::Config { .. }), "{size}/{overlap}");
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let pieces = chunk_text("", &config(30, 10)).expect("chunk");
        assert!(pieces.is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let pieces = chunk_text("short text", &config(100, 20)).expect("chunk");
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].text, "short text");
        assert_eq!(pieces[0].span, (0, 10));
    }

    #[test]
    fn two_sentence_example_produces_bounded_overlapping_chunks() {
        let text = "Cats are small domestic animals. Dogs are loyal companions.";
        let cfg = config(30, 10);
        let pieces = chunk_text(text, &cfg).expect("chunk");

        assert!(pieces.len() >= 2, "got {} chunks", pieces.len());
        for piece in &pieces {
            assert!(piece.text.chars().count() <= 30, "{:?}", piece.text);
        }
        for pair in pieces.windows(2) {
            assert_eq!(pair[1].span.0, pair[0].span.1 - 10);
        }
        assert_eq!(reconstruct(&pieces), text);
    }

    #[test]
    fn prefers_sentence_boundary_inside_lookback() {
        // A period sits one char before the window end; the cut should land
        // right after it instead of mid-word.
        let text = "aaaaaaaa.x bbbbbbbbbbbbbbbb";
        let pieces = chunk_text(text, &config(10, 2)).expect("chunk");
        assert_eq!(pieces[0].text, "aaaaaaaa.");
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let text: String = std::iter::repeat('x').take(100).collect();
        let pieces = chunk_text(&text, &config(30, 10)).expect("chunk");
        assert_eq!(pieces[0].text.chars().count(), 30);
        assert_eq!(reconstruct(&pieces), text);
    }

    #[test]
    fn never_splits_multibyte_characters() {
        let text = "héllo wörld ∂éjà vu ßßß 日本語のテキストです。 more text";
        let pieces = chunk_text(text, &config(8, 3)).expect("chunk");
        assert_eq!(reconstruct(&pieces), text);
        for piece in &pieces {
            assert_eq!(piece.text.chars().count(), piece.span.1 - piece.span.0);
        }
    }

    #[test]
    fn reconstruction_property_on_random_text() {
        fastrand::seed(42);
        let alphabet = "abc def. ghi\njk l ";
        for _ in 0..50 {
            let len = fastrand::usize(0..600);
            let text: String = (0..len)
                .map(|_| {
                    let chars: Vec<char> = alphabet.chars().collect();
                    chars[fastrand::usize(0..chars.len())]
                })
                .collect();
            let size = fastrand::usize(2..80);
            let overlap = fastrand::usize(1..size);
            let pieces = chunk_text(&text, &config(size, overlap)).expect("chunk");
            assert_eq!(reconstruct(&pieces), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Determinism matters. Identical inputs must give identical chunks.";
        let a = chunk_text(text, &config(25, 5)).expect("chunk");
        let b = chunk_text(text, &config(25, 5)).expect("chunk");
        assert_eq!(a, b);
    }
}
