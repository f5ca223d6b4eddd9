//! Fixed-window text chunker.
//!
//! Splits text into windows of at most `chunk_size` characters, each
//! starting `chunk_size - overlap` characters after the previous one, so
//! consecutive chunks share exactly `overlap` characters. The final window
//! ends at the end of the text and may be shorter.
//!
//! Lengths are counted in Unicode scalar values, never bytes, so a window
//! never cuts through a UTF-8 sequence.
//!
//! Each chunk gets a random UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::TextChunk;

/// Split `text` into overlapping windows.
///
/// Returns no chunks for empty text or a zero `chunk_size`. An `overlap`
/// of `chunk_size` or more is clamped to `chunk_size - 1` so every window
/// advances by at least one character.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    if chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::with_capacity(expected_chunk_count(char_len, chunk_size, overlap));
    let mut start = 0usize;
    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(chunks.len() as i64, start, piece));
        if end == char_len {
            break;
        }
        start += step;
    }

    chunks
}

/// Number of chunks [`chunk_text`] produces for a text of `len` characters.
pub fn expected_chunk_count(len: usize, chunk_size: usize, overlap: usize) -> usize {
    if len == 0 || chunk_size == 0 {
        0
    } else if len <= chunk_size {
        1
    } else {
        let overlap = overlap.min(chunk_size - 1);
        let step = chunk_size - overlap;
        (len - overlap).div_ceil(step)
    }
}

fn make_chunk(index: i64, start: usize, text: &str) -> TextChunk {
    TextChunk {
        id: Uuid::new_v4().to_string(),
        index,
        text: text.to_string(),
        start,
        hash: hash_text(text),
    }
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
