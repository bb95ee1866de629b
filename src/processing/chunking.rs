//! Character-based overlapping text splitter.
//!
//! Retrieval operates on bounded slices of the extracted document text. The
//! splitter produces fixed-size windows (1000 characters by default) with a
//! sliding overlap (200 by default) so that sentences spanning a boundary stay
//! visible to retrieval. Splitting counts `char`s, never bytes, so multi-byte
//! code points are never cut in half.

use super::types::ChunkingError;

/// Split `text` into overlapping character windows, preserving document order.
///
/// - `chunk_size` is a hard upper bound on the characters per chunk.
/// - `overlap` is the number of trailing characters repeated at the start of
///   the next chunk; values >= `chunk_size` are clamped to `chunk_size - 1`.
/// - Whitespace-only input yields zero chunks (a valid, degenerate document).
pub(crate) fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let effective_overlap = overlap.min(chunk_size - 1);
    let step = chunk_size - effective_overlap;
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
