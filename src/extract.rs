//! PDF text extraction.
//!
//! Uploaded documents are persisted to disk first; this module turns the stored
//! file back into plain UTF-8 text for chunking. Extraction failures cover both
//! unreadable files and byte streams that are not valid PDFs.

use std::path::Path;
use thiserror::Error;

/// Errors raised while loading text out of an uploaded document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file could not be read from disk.
    #[error("Failed to read document file: {0}")]
    Io(#[from] std::io::Error),
    /// The bytes did not parse as a PDF.
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
}

/// Extract the full text of the PDF at `path`.
///
/// Returns the concatenated page text in document order. A scanned PDF with no
/// text layer yields an empty (or whitespace-only) string, which downstream
/// chunking treats as a document with zero chunks.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    extract_text_from_bytes(&bytes)
}

/// Extract text from an in-memory PDF byte buffer.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| ExtractError::Pdf(err.to_string()))
}
