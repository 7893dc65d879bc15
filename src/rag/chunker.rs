//! Document splitting for ingestion.
//!
//! Chunks are windows of at most `chunk_size` characters that overlap by
//! `chunk_overlap`. A window prefers to end on a paragraph break, then a
//! line break, then a space, as long as that keeps it at least half full.

use serde::{Deserialize, Serialize};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Source identifier (file stem, book title...)
    pub source: String,
    /// Character offset in the source document
    pub start_offset: usize,
    pub chunk_index: usize,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Overlap is clamped below the chunk size so every window advances.
    pub fn new(config: ChunkerConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            config: ChunkerConfig {
                chunk_size,
                chunk_overlap: config.chunk_overlap.min(chunk_size - 1),
            },
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < total_chars {
            let mut end = (start + chunk_size).min(total_chars);
            if end < total_chars {
                if let Some(cut) = find_break(&chars, start, end, (chunk_size / 2).max(1)) {
                    end = cut;
                }
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end >= total_chars {
                break;
            }
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// End position just past the last preferred separator in `chars[start..end]`,
/// provided the resulting window keeps at least `min_len` characters.
fn find_break(chars: &[char], start: usize, end: usize, min_len: usize) -> Option<usize> {
    for separator in SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        if end < start + sep.len() {
            continue;
        }
        let mut i = end - sep.len();
        loop {
            if chars[i..i + sep.len()] == sep[..] {
                let cut = i + sep.len();
                if cut - start >= min_len {
                    return Some(cut);
                }
                break;
            }
            if i == start {
                break;
            }
            i -= 1;
        }
    }
    None
}
