//! Document processing pipeline: chunking, ingestion, retrieval, generation.

pub(crate) mod chunking;
pub mod service;
pub mod types;

pub use service::{SummarizerApi, SummarizerService};
pub use types::{ChunkingError, PipelineError, NO_CONTENT_MESSAGE};
