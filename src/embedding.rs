//! Sentence-embedding client abstraction and the hosted inference adapter.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    RequestFailed(String),
    /// Provider returned vectors of an unexpected dimensionality.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured on the server.
        expected: usize,
        /// Dimension observed in the provider response.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding adapter backed by the hosted feature-extraction pipeline.
pub struct HfEmbeddingClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_token: String,
    pub(crate) model: String,
    pub(crate) dimension: usize,
}

impl HfEmbeddingClient {
    /// Construct a client from the loaded configuration.
    pub fn new() -> Result<Self, EmbeddingClientError> {
        let config = get_config();
        let http = Client::builder()
            .user_agent("docsum/0.1")
            .build()
            .map_err(|err| EmbeddingClientError::RequestFailed(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.hf_inference_url.clone(),
            api_token: config.hf_api_token.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl EmbeddingClient for HfEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(model = %self.model, inputs = texts.len(), "Generating embeddings");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_token)
            .json(&json!({
                "inputs": texts,
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|err| EmbeddingClientError::RequestFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::RequestFailed(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|err| EmbeddingClientError::RequestFailed(err.to_string()))?;

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(EmbeddingClientError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String, dimension: usize) -> HfEmbeddingClient {
        HfEmbeddingClient {
            http: Client::builder()
                .user_agent("docsum-test")
                .build()
                .expect("client"),
            base_url,
            api_token: "token-123".into(),
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            dimension,
        }
    }

    #[tokio::test]
    async fn posts_inputs_and_parses_vectors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2")
                    .header("authorization", "Bearer token-123");
                then.status(200)
                    .json_body(serde_json::json!([[0.1, 0.2], [0.3, 0.4]]));
            })
            .await;

        let client = test_client(server.base_url(), 2);
        let vectors = client
            .generate_embeddings(vec!["alpha".into(), "beta".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn surfaces_upstream_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("invalid token");
            })
            .await;

        let client = test_client(server.base_url(), 2);
        let error = client
            .generate_embeddings(vec!["alpha".into()])
            .await
            .unwrap_err();
        assert!(error.to_string().contains("invalid token"));
    }

    #[tokio::test]
    async fn rejects_mismatched_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!([[0.1, 0.2, 0.3]]));
            })
            .await;

        let client = test_client(server.base_url(), 2);
        let error = client
            .generate_embeddings(vec!["alpha".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            EmbeddingClientError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        // No server needed; the client must not issue a request.
        let client = test_client("http://127.0.0.1:1".into(), 2);
        let vectors = client.generate_embeddings(Vec::new()).await.unwrap();
        assert!(vectors.is_empty());
    }
}
