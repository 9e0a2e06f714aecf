// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text chunker for embedding generation.
//!
//! Pages are split into overlapping windows of bounded character length.
//! Splitting is recursive: the text is cut on the first separator from the
//! cascade that occurs in it (paragraph, line, word, character), pieces that
//! are still too long are split again with the remaining separators, and the
//! resulting pieces are merged back into windows that carry the configured
//! overlap. Separators stay attached to the piece that follows them, so every
//! chunk is a contiguous span of its page and its start offset is exact.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::document::PageText;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 700;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Separator cascade, coarsest first. The empty separator splits characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for the text chunker.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Separators tried in order.
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig with the specified parameters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        })
    }

    /// Replaces the separator cascade.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A window of page text and the character offset where it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Character (not byte) offset within the page.
    pub start_offset: usize,
    /// The chunk text content, trimmed.
    pub text: String,
}

/// A chunk with the positional metadata it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier derived from source, page, offset and text.
    pub id: String,
    pub text: String,
    pub start_offset: usize,
    /// 1-indexed page number.
    pub page: u32,
    pub source_path: String,
}

impl DocumentChunk {
    pub fn new(text: String, start_offset: usize, page: u32, source_path: &str) -> Self {
        let id = chunk_id(source_path, page, start_offset, &text);
        Self {
            id,
            text,
            start_offset,
            page,
            source_path: source_path.to_string(),
        }
    }
}

fn chunk_id(source_path: &str, page: u32, start_offset: usize, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_path.as_bytes());
    hasher.update(&page.to_le_bytes());
    hasher.update(&(start_offset as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Byte span into the text being split, with its length in characters.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

/// Splits page text into overlapping chunks.
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Creates a chunker with default configuration (700 / 150).
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Splits a single text into chunks.
    pub fn chunk_text(&self, content: &str) -> Vec<TextChunk> {
        if content.is_empty() {
            return Vec::new();
        }

        let whole = Span {
            start: 0,
            end: content.len(),
            chars: content.chars().count(),
        };

        self.split_recursive(content, whole, &self.config.separators)
            .into_iter()
            .map(|span| TextChunk {
                start_offset: content[..span.start].chars().count(),
                text: content[span.start..span.end].to_string(),
            })
            .collect()
    }

    /// Splits every page and attaches page and source metadata.
    pub fn chunk_pages(&self, pages: &[PageText], source_path: &str) -> Vec<DocumentChunk> {
        pages
            .iter()
            .flat_map(|page| {
                self.chunk_text(&page.text).into_iter().map(move |chunk| {
                    DocumentChunk::new(chunk.text, chunk.start_offset, page.page, source_path)
                })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, span: Span, separators: &[String]) -> Vec<Span> {
        let slice = &text[span.start..span.end];

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (idx, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if slice.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[idx + 1..];
                break;
            }
        }

        let pieces = split_keep_separator(text, span, separator);

        let mut finished = Vec::new();
        let mut good = Vec::new();
        for piece in pieces {
            if piece.chars < self.config.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                finished.extend(self.merge(text, &good));
                good.clear();
            }
            if remaining.is_empty() {
                if let Some(trimmed) = trim_span(text, piece) {
                    finished.push(trimmed);
                }
            } else {
                finished.extend(self.split_recursive(text, piece, remaining));
            }
        }
        if !good.is_empty() {
            finished.extend(self.merge(text, &good));
        }

        finished
    }

    /// Greedily packs contiguous pieces into windows no longer than
    /// `chunk_size`, keeping up to `chunk_overlap` characters of trailing
    /// pieces at the start of the next window.
    fn merge(&self, text: &str, pieces: &[Span]) -> Vec<Span> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut windows = Vec::new();
        let mut first = 0usize;
        let mut total = 0usize;

        for (idx, piece) in pieces.iter().enumerate() {
            if total + piece.chars > size && idx > first {
                if let Some(window) = join_span(text, &pieces[first..idx]) {
                    windows.push(window);
                }
                while first < idx
                    && (total > overlap || (total + piece.chars > size && total > 0))
                {
                    total -= pieces[first].chars;
                    first += 1;
                }
            }
            total += piece.chars;
        }

        if first < pieces.len() {
            if let Some(window) = join_span(text, &pieces[first..]) {
                windows.push(window);
            }
        }

        windows
    }
}

/// Splits `span` on `separator`, attaching each separator to the piece that
/// follows it. Empty pieces are dropped.
fn split_keep_separator(text: &str, span: Span, separator: &str) -> Vec<Span> {
    let slice = &text[span.start..span.end];

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(idx, ch)| Span {
                start: span.start + idx,
                end: span.start + idx + ch.len_utf8(),
                chars: 1,
            })
            .collect();
    }

    let mut bounds: Vec<usize> = vec![0];
    bounds.extend(slice.match_indices(separator).map(|(idx, _)| idx));
    bounds.push(slice.len());
    bounds.dedup();

    bounds
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .map(|pair| Span {
            start: span.start + pair[0],
            end: span.start + pair[1],
            chars: slice[pair[0]..pair[1]].chars().count(),
        })
        .collect()
}

fn join_span(text: &str, pieces: &[Span]) -> Option<Span> {
    let first = pieces.first()?;
    let last = pieces.last()?;
    trim_span(
        text,
        Span {
            start: first.start,
            end: last.end,
            chars: pieces.iter().map(|p| p.chars).sum(),
        },
    )
}

/// Trims surrounding whitespace; `None` if nothing is left.
fn trim_span(text: &str, span: Span) -> Option<Span> {
    let slice = &text[span.start..span.end];
    let trimmed_start = slice.trim_start();
    let lead = slice.len() - trimmed_start.len();
    let trimmed = trimmed_start.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some(Span {
        start: span.start + lead,
        end: span.start + lead + trimmed.len(),
        chars: trimmed.chars().count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_text(sentences: usize) -> String {
        (1..=sentences)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i * 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn char_slice(text: &str, start: usize, len: usize) -> String {
        text.chars().skip(start).take(len).collect()
    }

    #[test]
    fn test_default_config() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 700);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.separators, vec!["\n\n", "\n", " ", ""]);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(700, 150).is_ok());
        assert!(ChunkConfig::new(20, 20).is_err());
        assert!(ChunkConfig::new(20, 30).is_err());
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_empty_content() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.chunk_pages(&[], "doc.pdf").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk_text("  The capital of France is Paris.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The capital of France is Paris.");
        assert_eq!(chunks[0].start_offset, 2);
    }

    #[test]
    fn test_chunks_respect_size_and_offsets() {
        let text = sentence_text(80);
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let len = chunk.text.chars().count();
            assert!(len <= 700, "chunk too long: {}", len);
            assert_eq!(char_slice(&text, chunk.start_offset, len), chunk.text);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = sentence_text(80);
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk_text(&text);

        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_offset + pair[0].text.chars().count();
            assert!(pair[1].start_offset > pair[0].start_offset);
            assert!(pair[1].start_offset < prev_end, "no overlap between chunks");
            assert!(prev_end - pair[1].start_offset <= 150);
        }
    }

    #[test]
    fn test_chunks_cover_every_non_whitespace_char() {
        let text = format!(
            "{}\n\n{}\n{}",
            sentence_text(30),
            sentence_text(12),
            "x".repeat(1600)
        );
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk_text(&text);

        let chars: Vec<char> = text.chars().collect();
        let mut covered = vec![false; chars.len()];
        for chunk in &chunks {
            let len = chunk.text.chars().count();
            for slot in covered.iter_mut().skip(chunk.start_offset).take(len) {
                *slot = true;
            }
        }

        for (idx, ch) in chars.iter().enumerate() {
            if !ch.is_whitespace() {
                assert!(covered[idx], "char {} at {} not covered", ch, idx);
            }
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "a".repeat(400);
        let second = "b".repeat(400);
        let text = format!("{}\n\n{}", first, second);
        let chunker = RecursiveChunker::with_defaults();

        let chunks = chunker.chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, first);
        assert_eq!(chunks[1].text, second);
        assert_eq!(chunks[1].start_offset, 402);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "z".repeat(1500);
        let chunker = RecursiveChunker::new(ChunkConfig::new(700, 150).unwrap());

        let chunks = chunker.chunk_text(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 700));
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_offsets_count_characters_not_bytes() {
        let text = format!("{} {}", "é".repeat(10), "ü".repeat(5));
        let chunker = RecursiveChunker::new(
            ChunkConfig::new(12, 2).unwrap().with_separators(&[" ", ""]),
        );

        let chunks = chunker.chunk_text(&text);
        let last = chunks.last().unwrap();
        assert_eq!(last.text, "ü".repeat(5));
        assert_eq!(last.start_offset, 11);
    }

    #[test]
    fn test_chunk_pages_carries_metadata() {
        let pages = vec![
            PageText {
                page: 1,
                text: "First page text.".to_string(),
            },
            PageText {
                page: 2,
                text: "   ".to_string(),
            },
            PageText {
                page: 3,
                text: "Third page text.".to_string(),
            },
        ];
        let chunker = RecursiveChunker::with_defaults();

        let chunks = chunker.chunk_pages(&pages, "doc.pdf");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 3);
        assert_eq!(chunks[1].source_path, "doc.pdf");
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_chunk_id_is_stable() {
        let a = DocumentChunk::new("hello".to_string(), 3, 1, "doc.pdf");
        let b = DocumentChunk::new("hello".to_string(), 3, 1, "doc.pdf");
        let c = DocumentChunk::new("hello".to_string(), 4, 1, "doc.pdf");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 16);
    }
}
