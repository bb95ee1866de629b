//! Core data types and error definitions for the summarization pipeline.

use crate::embedding::EmbeddingClientError;
use crate::extract::ExtractError;
use crate::generation::GenerationClientError;
use crate::qdrant::QdrantError;
use thiserror::Error;

/// User-facing message for the empty-retrieval condition. This is a content
/// problem, not a system fault, and must read as such.
pub const NO_CONTENT_MESSAGE: &str = "No document content was found in the vector store. \
     The PDF may not have processed correctly or the content may be unreadable.";

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Pipeline configured an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the summarization and question-answering pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stored file was unreadable or not a valid PDF.
    #[error("{0}")]
    Extract(#[from] ExtractError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("{0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Generation provider failed to produce text.
    #[error("{0}")]
    Generation(#[from] GenerationClientError),
    /// Vector store interaction failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Retrieval produced zero matches for the document.
    #[error("{NO_CONTENT_MESSAGE}")]
    NoContent,
}

impl PipelineError {
    /// Short classifier used when formatting error payloads for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extract(_) => "LoadError",
            Self::Chunking(_) => "ChunkingError",
            Self::Embedding(_) | Self::Generation(_) | Self::Qdrant(_) => "ServiceError",
            Self::NoContent => "EmptyResult",
        }
    }
}
