//! Splitting documents into overlapping, size-bounded chunks.
//!
//! Sizes are measured in characters, not bytes, so multi-byte text is never
//! split inside a code point. Chunk ends are pulled back to the nearest
//! whitespace when one is close, to avoid cutting words in half.

use crate::{
    document::{Chunk, Document},
    error::{Error, Result},
};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between neighbouring chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// How far back (in characters) to look for a word boundary.
const BOUNDARY_LOOKBACK: usize = 100;

/// Validated chunking parameters.
///
/// # Examples
///
/// ```
/// use vaultrag::chunking::ChunkingConfig;
///
/// assert!(ChunkingConfig::new(1000, 200).is_ok());
/// assert!(ChunkingConfig::new(200, 200).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    /// Fails with [`Error::Config`] unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A window of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    /// Byte offset of the window in the original text.
    pub start_offset: usize,
}

/// Split a document into chunks. Blank documents produce no chunks.
pub fn split_document(doc: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(&doc.content, config.chunk_size, config.overlap)
        .into_iter()
        .enumerate()
        .map(|(index, span)| doc.chunk(index, span.text))
        .collect()
}

/// Split text into windows of at most `chunk_size` characters, each
/// sharing up to `overlap` characters with its predecessor.
///
/// Windows that are entirely whitespace are dropped. Consecutive windows
/// never leave a gap, so every non-whitespace character lands in at least
/// one window.
///
/// # Examples
///
/// ```
/// use vaultrag::chunking::chunk_text;
///
/// let spans = chunk_text("Hello, world!", 1000, 0);
/// assert_eq!(spans.len(), 1);
///
/// let text = "word ".repeat(500);
/// let spans = chunk_text(&text, 1000, 200);
/// assert!(spans.len() >= 3);
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Span> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let char_count = text.chars().count();

    if char_count <= chunk_size {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Span {
            text: text.to_string(),
            start_offset: 0,
        }];
    }

    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(char_count);
        let cut = if end < char_count {
            word_boundary(text, &char_to_byte, start + overlap + 1, end)
        } else {
            end
        };

        let start_byte = char_to_byte[start];
        let slice = &text[start_byte..char_to_byte[cut]];
        if !slice.trim().is_empty() {
            spans.push(Span {
                text: slice.to_string(),
                start_offset: start_byte,
            });
        }

        if cut >= char_count {
            break;
        }
        start = cut.saturating_sub(overlap).max(start + 1);
    }

    spans
}

/// Find the char index just past the last whitespace in `[floor, pos)`,
/// looking back at most [`BOUNDARY_LOOKBACK`] characters. Returns `pos`
/// when there is none.
fn word_boundary(
    text: &str,
    char_to_byte: &[usize],
    floor: usize,
    pos: usize,
) -> usize {
    let from = pos.saturating_sub(BOUNDARY_LOOKBACK).max(floor);
    if from >= pos {
        return pos;
    }

    let region = &text[char_to_byte[from]..char_to_byte[pos]];
    match region.rfind(char::is_whitespace) {
        Some(ws_byte) => from + region[..ws_byte].chars().count() + 1,
        None => pos,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::document::RawDocument;

    #[test]
    fn config_rejects_overlap_not_below_size() {
        assert!(matches!(
            ChunkingConfig::new(100, 100),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ChunkingConfig::new(100, 150),
            Err(Error::Config(_))
        ));
        assert!(matches!(ChunkingConfig::new(0, 0), Err(Error::Config(_))));
        assert!(ChunkingConfig::new(100, 99).is_ok());
    }

    #[test]
    fn short_text_single_span() {
        let spans = chunk_text("Hello, world!", 100, 10);
        assert_eq!(
            spans,
            vec![Span {
                text: "Hello, world!".into(),
                start_offset: 0
            }]
        );
    }

    #[test]
    fn blank_text_has_no_spans() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n\t", 100, 10).is_empty());
    }

    #[test]
    fn long_text_overlaps() {
        let text = "word ".repeat(500);
        let spans = chunk_text(&text, 1000, 200);

        assert!(spans.len() >= 3);
        for pair in spans.windows(2) {
            let first_end = pair[0].start_offset + pair[0].text.len();
            assert!(pair[1].start_offset < first_end, "spans should overlap");
        }
    }

    #[test]
    fn spans_respect_size_limit() {
        let text = "lorem ipsum dolor sit amet ".repeat(200);
        for span in chunk_text(&text, 300, 50) {
            assert!(span.text.chars().count() <= 300);
        }
    }

    #[test]
    fn spans_cover_whole_text_without_gaps() {
        let text = "abcdefghij".repeat(300);
        let spans = chunk_text(&text, 1000, 0);

        assert_eq!(spans[0].start_offset, 0);
        for pair in spans.windows(2) {
            let first_end = pair[0].start_offset + pair[0].text.len();
            assert!(pair[1].start_offset <= first_end, "gap between spans");
        }
        let last = spans.last().unwrap();
        assert_eq!(last.start_offset + last.text.len(), text.len());
    }

    #[test]
    fn breaks_on_whitespace_when_possible() {
        let text = format!("{} {}", "a".repeat(90), "b".repeat(90));
        let spans = chunk_text(&text, 100, 0);
        assert_eq!(spans[0].text, format!("{} ", "a".repeat(90)));
        assert_eq!(spans[1].text, "b".repeat(90));
    }

    #[test]
    fn handles_multibyte_chars() {
        let text = "café ☕ naïve 日本語 🎉 ".repeat(50);
        let spans = chunk_text(&text, 100, 20);
        assert!(!spans.is_empty());
        for span in &spans {
            assert!(span.text.chars().count() <= 100);
        }
    }

    #[test]
    fn split_document_derives_chunk_identities() {
        let doc = Document::parse(RawDocument {
            bytes: "word ".repeat(100).into_bytes(),
            source: PathBuf::from("long.md"),
        })
        .unwrap();
        let config = ChunkingConfig::new(120, 20).unwrap();
        let chunks = split_document(&doc, &config);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.parent, doc.identity);
            assert_eq!(chunk.identity, doc.identity.derive_chunk(i));
        }
    }
}
