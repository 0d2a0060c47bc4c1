//! Chunking utilities for splitting extracted page text into overlapping
//! passages.
//!
//! Splitting is character-based with word-boundary snapping. The defaults
//! (1000 characters with 200 overlap) keep each passage small enough to
//! embed individually while preserving context across chunk edges.

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunking configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk of text from a larger document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the source text.
    pub index: usize,
    /// Byte offset where this chunk starts in the original text.
    pub start_offset: usize,
}

/// Split text into chunks (optionally overlapping).
///
/// If the text is shorter than `chunk_size`, returns a single chunk.
/// Properly handles UTF-8 multi-byte characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let char_count = text.chars().count();

    if char_count <= chunk_size {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Chunk {
            text: text.to_string(),
            index: 0,
            start_offset: 0,
        }];
    }

    // Map of char index -> byte index for O(1) slicing.
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start_char = 0;
    let mut index = 0;

    while start_char < char_count {
        let end_char = (start_char + chunk_size).min(char_count);

        // Prefer a word boundary unless we're at the end of the text.
        // The boundary search looks back up to 100 chars, so clamp it to
        // keep the chunk non-empty for very small chunk sizes.
        let chunk_end_char = if end_char < char_count {
            find_word_boundary_char(text, &char_to_byte, end_char)
                .max(start_char + 1)
        } else {
            end_char
        };

        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[chunk_end_char];

        let chunk_text = &text[start_byte..end_byte];
        if !chunk_text.trim().is_empty() {
            chunks.push(Chunk {
                text: chunk_text.to_string(),
                index,
                start_offset: start_byte,
            });
            index += 1;
        }

        start_char += step;

        // Avoid creating a tiny final chunk.
        if char_count.saturating_sub(start_char) < chunk_size / 4
            && !chunks.is_empty()
        {
            break;
        }
    }

    chunks
}

/// Find a word boundary near the given char position, preferring to break
/// at whitespace.
fn find_word_boundary_char(
    text: &str,
    char_to_byte: &[usize],
    pos_char: usize,
) -> usize {
    // Look back up to 100 chars for a good break point.
    let search_start_char = pos_char.saturating_sub(100);

    let start_byte = char_to_byte[search_start_char];
    let end_byte = char_to_byte[pos_char];
    let search_region = &text[start_byte..end_byte];

    if let Some(ws_byte_offset) =
        search_region.rfind(|c: char| c.is_whitespace())
    {
        let ws_byte = start_byte + ws_byte_offset;
        for (char_idx, &byte_idx) in char_to_byte.iter().enumerate() {
            if byte_idx > ws_byte {
                return char_idx;
            }
        }
    }

    pos_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("   \n  ", 1000, 200).is_empty());
    }

    #[test]
    fn long_text_gets_split() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
    }

    #[test]
    fn overlapping_chunks_share_text() {
        let text = "alpha ".repeat(400);
        let chunks = chunk_text(&text, 600, 200);
        assert!(chunks.len() >= 2);
        // With a 200-char overlap and a 400-char step, consecutive
        // start offsets differ by roughly the step size.
        assert!(chunks[1].start_offset < 600);
        assert!(chunks[1].start_offset > 0);
    }

    #[test]
    fn indices_are_sequential() {
        let text = "beta ".repeat(600);
        let chunks = chunk_text(&text, 500, 0);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "héllo wörld 🌍 ".repeat(200);
        let chunks = chunk_text(&text, 300, 50);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            // Every chunk must be valid UTF-8 slicing (would have panicked
            // above otherwise) and non-empty.
            assert!(!chunk.text.trim().is_empty());
        }
    }

    #[test]
    fn breaks_at_word_boundaries() {
        let text = "aaaa bbbb cccc dddd ".repeat(100);
        let chunks = chunk_text(&text, 100, 0);
        for chunk in chunks.iter().take(chunks.len() - 1) {
            assert!(
                chunk.text.ends_with(char::is_whitespace)
                    || chunk.text.ends_with(|c: char| !c.is_alphanumeric()),
                "chunk should end near a word boundary: {:?}",
                &chunk.text[chunk.text.len().saturating_sub(10)..]
            );
        }
    }
}
