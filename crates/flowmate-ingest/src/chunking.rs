//! Fixed-window text chunking.
//!
//! Windows are measured in characters, not bytes, so multi-byte scripts
//! get the same nominal chunk size as ASCII. The total number of chunks is
//! capped; text beyond the cap is dropped.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
/// Default cap on chunks per document.
pub const DEFAULT_MAX_CHUNKS: usize = 20;
/// Chunks whose trimmed length does not exceed this are discarded.
pub const DEFAULT_MIN_CHUNK_LEN: usize = 10;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub min_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_chunks: DEFAULT_MAX_CHUNKS,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
        }
    }
}

impl ChunkingConfig {
    /// Distance between consecutive window starts. Always at least one.
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

/// A trimmed text window with its character span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    /// Window start, in characters.
    pub start_char: usize,
    /// Window end (exclusive), in characters.
    pub end_char: usize,
}

/// Split text into overlapping fixed-size windows.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().chars().count() < config.min_chunk_len {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let size = config.chunk_size.max(1);
    let step = config.step();

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut truncated = false;

    while start < total {
        if chunks.len() >= config.max_chunks {
            truncated = true;
            break;
        }

        let end = (start + size).min(total);
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();

        if trimmed.chars().count() > config.min_chunk_len {
            chunks.push(TextChunk {
                text: trimmed.to_string(),
                chunk_index: chunks.len(),
                start_char: start,
                end_char: end,
            });
        }

        if end == total {
            break;
        }
        start += step;
    }

    if truncated {
        warn!(
            "Chunk cap of {} reached; dropped text after character {} of {}",
            config.max_chunks, start, total
        );
    }
    info!("Split {} characters into {} chunks", total, chunks.len());

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_text(len: usize) -> String {
        "The quick brown fox jumps over the lazy dog. "
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let config = ChunkingConfig::default();
        assert!(split_text("", &config).is_empty());
        assert!(split_text("   \n\t  \n", &config).is_empty());
        assert!(split_text("too short", &config).is_empty());
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let text = "  Fifty characters of plain text for one chunk.  ";
        let config = ChunkingConfig::default();
        let chunks = split_text(text, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text.trim());
        assert_eq!(chunks[0].start_char, 0);
    }

    #[test]
    fn test_chunk_count_never_exceeds_cap() {
        let config = ChunkingConfig::default();
        let chunks = split_text(&sentence_text(50_000), &config);
        assert_eq!(chunks.len(), config.max_chunks);

        let small_cap = ChunkingConfig {
            max_chunks: 3,
            ..ChunkingConfig::default()
        };
        assert_eq!(split_text(&sentence_text(5_000), &small_cap).len(), 3);
    }

    #[test]
    fn test_windows_overlap() {
        let config = ChunkingConfig::default();
        let chunks = split_text(&sentence_text(2_300), &config);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char);
            assert_eq!(pair[1].start_char - pair[0].start_char, config.step());
        }
        for chunk in &chunks {
            assert!(chunk.text.chars().count() >= config.min_chunk_len);
            assert!(chunk.end_char - chunk.start_char <= config.chunk_size);
        }
    }

    #[test]
    fn test_stops_at_end_of_text() {
        // 900 chars: windows at 0 and 400; the second reaches the end.
        let config = ChunkingConfig::default();
        let chunks = split_text(&"a".repeat(900), &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_char, 400);
        assert_eq!(chunks[1].end_char, 900);
    }

    #[test]
    fn test_windows_count_characters_not_bytes() {
        let text: String = "가나다라마바사아자차".chars().cycle().take(600).collect();
        let chunks = split_text(&text, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 500);
        assert_eq!(chunks[1].text.chars().count(), 200);
    }

    #[test]
    fn test_whitespace_windows_are_dropped() {
        let config = ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 0,
            max_chunks: 10,
            min_chunk_len: 10,
        };
        let text = format!("{}{}{}", "x".repeat(20), " ".repeat(20), "y".repeat(20));
        let chunks = split_text(&text, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].start_char, 40);
    }

    #[test]
    fn test_overlap_larger_than_size_still_advances() {
        let config = ChunkingConfig {
            chunk_size: 15,
            chunk_overlap: 40,
            max_chunks: 100,
            min_chunk_len: 10,
        };
        assert_eq!(config.step(), 1);
        let chunks = split_text(&"z".repeat(30), &config);
        assert_eq!(chunks.len(), 16);
    }
}
