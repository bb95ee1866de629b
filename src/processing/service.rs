//! Pipeline service coordinating extraction, chunking, embedding, retrieval,
//! and generation.
//!
//! The service owns long-lived handles to the embedding client, generation
//! client, Qdrant transport, and metrics registry. Construct it once near
//! process start and share it through an `Arc`.
//!
//! Index scoping is deliberately uniform: every document's chunks live in one
//! persistent collection under a `doc_id` payload namespace. Summarization
//! ingests into that namespace and leaves the vectors in place so later
//! questions against the same document retrieve real content. The only
//! teardown is the compensating delete on the summarize failure path.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, HfEmbeddingClient},
    extract,
    generation::{GenerationClient, GenerationRequest, HfGenerationClient},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{chunking::chunk_text, types::PipelineError},
    qdrant::{ChunkPoint, QdrantService},
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Fixed instruction used for the summarization flow.
const SUMMARY_INSTRUCTION: &str = "Based on the provided document content, write a detailed and \
     accurate summary that captures the main ideas, key findings, and important conclusions. Be \
     specific about the actual content of the document.";

/// Coordinates the full summarize/ask pipeline against external services.
pub struct SummarizerService {
    embedding_client: Box<dyn EmbeddingClient>,
    generation_client: Box<dyn GenerationClient>,
    qdrant_service: QdrantService,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait SummarizerApi: Send + Sync {
    /// Ingest the PDF at `pdf_path` under the document's namespace and return
    /// a generated summary.
    async fn summarize_document(
        &self,
        doc_id: i64,
        pdf_path: &Path,
    ) -> Result<String, PipelineError>;

    /// Answer a free-form question against a previously ingested document.
    async fn answer_question(&self, doc_id: i64, question: &str)
        -> Result<String, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl SummarizerService {
    /// Build a new pipeline service from the loaded configuration.
    pub fn new() -> Result<Self, PipelineError> {
        tracing::info!("Initializing inference clients");
        let embedding_client = Box::new(HfEmbeddingClient::new()?);
        let generation_client = Box::new(HfGenerationClient::new()?);
        let qdrant_service = QdrantService::new()?;

        Ok(Self {
            embedding_client,
            generation_client,
            qdrant_service,
            metrics: Arc::new(ServiceMetrics::new()),
        })
    }

    /// Extract, chunk, embed, and index a document, then produce its summary.
    pub async fn summarize_document(
        &self,
        doc_id: i64,
        pdf_path: &Path,
    ) -> Result<String, PipelineError> {
        let config = get_config();
        tracing::info!(doc_id, path = %pdf_path.display(), "Summarizing document");

        let text = extract::extract_text(pdf_path)?;
        let chunks = chunk_text(&text, config.chunk_size, config.chunk_overlap)?;
        tracing::debug!(doc_id, chunks = chunks.len(), "Document chunked");
        if chunks.is_empty() {
            return Err(PipelineError::NoContent);
        }

        let collection = &config.qdrant_collection_name;
        self.qdrant_service
            .create_collection_if_not_exists(collection, config.embedding_dimension as u64)
            .await?;
        self.qdrant_service
            .wait_until_ready(
                collection,
                Duration::from_secs(config.index_ready_timeout_secs),
            )
            .await?;

        let embeddings = self
            .embedding_client
            .generate_embeddings(chunks.clone())
            .await?;
        debug_assert_eq!(chunks.len(), embeddings.len());

        let points: Vec<ChunkPoint> = chunks
            .into_iter()
            .zip(embeddings.into_iter())
            .enumerate()
            .map(|(position, (text, vector))| ChunkPoint {
                text,
                position,
                vector,
            })
            .collect();

        let chunk_count = self
            .qdrant_service
            .upsert_points(collection, doc_id, points)
            .await?;

        // Vectors are in place; anything failing from here on must not leave
        // the namespace half-usable. Compensating delete, best-effort.
        match self
            .retrieve_and_generate(doc_id, SUMMARY_INSTRUCTION, None)
            .await
        {
            Ok(summary) => {
                self.metrics.record_summary(chunk_count as u64);
                tracing::info!(doc_id, chunks = chunk_count, "Document summarized");
                Ok(summary)
            }
            Err(err) => {
                if let Err(cleanup_err) = self
                    .qdrant_service
                    .delete_document_points(collection, doc_id)
                    .await
                {
                    tracing::warn!(doc_id, error = %cleanup_err, "Failed to delete document vectors during cleanup");
                }
                Err(err)
            }
        }
    }

    /// Answer a question about a previously summarized document.
    pub async fn answer_question(
        &self,
        doc_id: i64,
        question: &str,
    ) -> Result<String, PipelineError> {
        tracing::info!(doc_id, "Answering question");
        let answer = self
            .retrieve_and_generate(doc_id, question, Some(question))
            .await?;
        self.metrics.record_question();
        Ok(answer)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Retrieve the top-k chunks for `query` within the document's namespace
    /// and condition the generation model on them ("stuff" strategy).
    async fn retrieve_and_generate(
        &self,
        doc_id: i64,
        query: &str,
        question: Option<&str>,
    ) -> Result<String, PipelineError> {
        let config = get_config();

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(PipelineError::NoContent)?;

        let hits = self
            .qdrant_service
            .search_points(
                &config.qdrant_collection_name,
                vector,
                doc_id,
                config.search_top_k,
            )
            .await?;
        if hits.is_empty() {
            return Err(PipelineError::NoContent);
        }

        let context: Vec<String> = hits.into_iter().filter_map(|hit| hit.text).collect();
        if context.is_empty() {
            return Err(PipelineError::NoContent);
        }

        let prompt = build_prompt(&context, question.unwrap_or(SUMMARY_INSTRUCTION));
        let answer = self
            .generation_client
            .generate(GenerationRequest { prompt })
            .await?;
        Ok(answer)
    }
}

/// Concatenate retrieved chunks and the instruction into a single prompt.
fn build_prompt(context: &[String], question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context.join("\n\n"),
        question
    )
}

#[async_trait]
impl SummarizerApi for SummarizerService {
    async fn summarize_document(
        &self,
        doc_id: i64,
        pdf_path: &Path,
    ) -> Result<String, PipelineError> {
        SummarizerService::summarize_document(self, doc_id, pdf_path).await
    }

    async fn answer_question(
        &self,
        doc_id: i64,
        question: &str,
    ) -> Result<String, PipelineError> {
        SummarizerService::answer_question(self, doc_id, question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        SummarizerService::metrics_snapshot(self)
    }
}
