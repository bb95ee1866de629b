//! HTTP client wrapper for interacting with Qdrant.
//!
//! One persistent collection holds every document's chunks; each point carries
//! a `doc_id` payload field so that ingestion, retrieval, and cleanup all
//! operate on the same per-document namespace.

use crate::config::get_config;
use crate::documents::current_timestamp_rfc3339;
use crate::qdrant::types::{
    ChunkPoint, CollectionInfoResponse, QdrantError, QueryResponse, QueryResponseResult,
    ScoredPoint,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// Interval between collection-readiness probes.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        let client = Client::builder().user_agent("docsum/0.1").build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection configured for cosine similarity.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Poll the collection status until it reports ready, bounded by `timeout`.
    ///
    /// "Accepted" and "queryable" are distinct states for a fresh collection;
    /// ingestion only proceeds on the latter.
    pub async fn wait_until_ready(
        &self,
        collection_name: &str,
        timeout: Duration,
    ) -> Result<(), QdrantError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.collection_status(collection_name).await {
                Ok(status) if status == "green" => {
                    tracing::debug!(collection = collection_name, "Collection ready");
                    return Ok(());
                }
                Ok(status) => {
                    tracing::debug!(collection = collection_name, status, "Collection not ready yet");
                }
                Err(err) => {
                    tracing::debug!(collection = collection_name, error = %err, "Readiness probe failed; retrying");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(QdrantError::NotReady {
                    collection: collection_name.to_string(),
                    waited_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Upsert a document's chunk vectors, returning the inserted count.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        doc_id: i64,
        points: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": point.vector,
                    "payload": {
                        "doc_id": doc_id,
                        "text": point.text,
                        "position": point.position,
                        "indexed_at": now,
                    },
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                doc_id,
                points = point_count,
                "Points indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search scoped to one document's chunks.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        doc_id: i64,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": doc_filter(doc_id),
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| {
                let text = point.payload.as_ref().and_then(|payload| {
                    payload
                        .get("text")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
                ScoredPoint {
                    id: stringify_point_id(point.id),
                    score: point.score,
                    text,
                }
            })
            .collect();

        Ok(results)
    }

    /// Delete every point belonging to a document (namespace teardown).
    pub async fn delete_document_points(
        &self,
        collection_name: &str,
        doc_id: i64,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "filter": doc_filter(doc_id) }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, doc_id, "Document points deleted");
        })
        .await
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn collection_status(&self, collection_name: &str) -> Result<String, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QdrantError::UnexpectedStatus { status, body });
        }

        let info: CollectionInfoResponse = response.json().await?;
        Ok(info.result.status)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

/// Filter matching every point stored under a document's namespace.
fn doc_filter(doc_id: i64) -> Value {
    json!({
        "must": [
            {
                "key": "doc_id",
                "match": { "value": doc_id }
            }
        ]
    })
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
