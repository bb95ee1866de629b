//! HTTP surface for docsum.
//!
//! This module exposes a compact Axum router with three endpoints:
//!
//! - `POST /api/summarize/` – Accept a multipart PDF upload, persist it, run the
//!   ingestion and generation pipeline, and return the stored document with its
//!   summary.
//! - `POST /api/ask/` – Answer a free-form question against a previously
//!   uploaded document.
//! - `GET /metrics` – Observe summarization and Q&A counters.
//!
//! Every pipeline error is converted to a JSON `{"error": ...}` body at this
//! boundary: validation problems map to 400, unknown documents to 404, and
//! everything else to 500 carrying the upstream message.

use crate::documents::{Document, DocumentStore, StoreError};
use crate::processing::{PipelineError, SummarizerApi};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Upper bound on uploaded file size (50 MiB).
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState<S> {
    /// Persistent document records and file storage.
    pub store: DocumentStore,
    /// Summarization/Q&A pipeline.
    pub service: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(store: DocumentStore, service: Arc<S>) -> Router
where
    S: SummarizerApi + 'static,
{
    let state = AppState { store, service };
    Router::new()
        .route("/api/summarize/", post(summarize::<S>))
        .route("/api/summarize", post(summarize::<S>))
        .route("/api/ask/", post(ask::<S>))
        .route("/api/ask", post(ask::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Accept a PDF upload, summarize it, and return the stored record.
///
/// On any failure after the record was created, the handler deletes the record
/// again (best-effort) so a failed request leaves no orphan rows behind, then
/// reports the original error.
async fn summarize<S>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<Json<Document>, ApiError>
where
    S: SummarizerApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::validation(format!("malformed multipart body: {err}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::validation(format!("failed to read upload: {err}")))?;
            upload = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::validation("multipart field 'file' is required"))?;

    let document = state
        .store
        .save(&file_name, &bytes)
        .await
        .map_err(ApiError::store_failure)?;
    let pdf_path = state.store.absolute_path(&document);

    let summary = match state.service.summarize_document(document.id, &pdf_path).await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(id = document.id, error = %err, "Summarization failed");
            state.store.delete_silently(&document).await;
            return Err(ApiError::pipeline(&err));
        }
    };

    if let Err(err) = state.store.update_summary(document.id, &summary).await {
        tracing::error!(id = document.id, error = %err, "Failed to persist summary");
        state.store.delete_silently(&document).await;
        return Err(ApiError::store_failure(err));
    }

    tracing::info!(id = document.id, "Summarize request completed");
    Ok(Json(Document {
        summary: Some(summary),
        ..document
    }))
}

/// Request body for the `POST /api/ask/` endpoint.
///
/// Fields are optional at the type level so that a missing field produces a
/// controlled 400 instead of a deserialization rejection.
#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    document_id: Option<i64>,
    #[serde(default)]
    question: Option<String>,
}

/// Answer a question against a stored document.
async fn ask<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: SummarizerApi,
{
    let (document_id, question) = match (request.document_id, request.question) {
        (Some(id), Some(question)) if !question.trim().is_empty() => (id, question),
        _ => {
            return Err(ApiError::validation(
                "Document ID and question are required.",
            ));
        }
    };

    let document = state.store.get(document_id).await?;

    let answer = state
        .service
        .answer_question(document.id, &question)
        .await
        .map_err(|err| {
            tracing::error!(id = document.id, error = %err, "Question answering failed");
            ApiError::internal(&err)
        })?;

    tracing::info!(id = document.id, "Ask request completed");
    Ok(Json(json!({ "answer": answer })))
}

/// Return a concise metrics snapshot with summarization and Q&A counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Response
where
    S: SummarizerApi,
{
    Json(state.service.metrics_snapshot()).into_response()
}

/// Error payload emitted at the HTTP boundary.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Summarize failures carry the error class as a `<Kind>: <message>` prefix.
    fn pipeline(error: &PipelineError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{}: {}", error.kind(), error),
        }
    }

    /// Ask failures report the bare message without a classifying prefix.
    fn internal(error: &PipelineError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }

    /// Store failures on the summarize path. Server-side failures follow the
    /// same `<Kind>: <message>` convention as [`ApiError::pipeline`]; client
    /// errors keep their bare message.
    fn store_failure(error: StoreError) -> Self {
        match &error {
            StoreError::InvalidUpload(_) => Self::validation(error.to_string()),
            StoreError::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: error.to_string(),
            },
            StoreError::Database(_) | StoreError::Io(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("StoreError: {error}"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match &error {
            StoreError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Database(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationClientError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::PipelineError;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Summarize(i64),
        Answer(i64, String),
    }

    struct StubSummarizer {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_summarize: bool,
        fail_answer: bool,
    }

    impl StubSummarizer {
        fn new(fail_summarize: bool) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_summarize,
                fail_answer: false,
            }
        }

        fn with_failing_answers() -> Self {
            Self {
                fail_answer: true,
                ..Self::new(false)
            }
        }

        async fn recorded_calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl SummarizerApi for StubSummarizer {
        async fn summarize_document(
            &self,
            doc_id: i64,
            _pdf_path: &Path,
        ) -> Result<String, PipelineError> {
            self.calls.lock().await.push(Call::Summarize(doc_id));
            if self.fail_summarize {
                Err(PipelineError::NoContent)
            } else {
                Ok("Stub summary.".to_string())
            }
        }

        async fn answer_question(
            &self,
            doc_id: i64,
            question: &str,
        ) -> Result<String, PipelineError> {
            self.calls
                .lock()
                .await
                .push(Call::Answer(doc_id, question.to_string()));
            if self.fail_answer {
                Err(PipelineError::Generation(
                    GenerationClientError::RequestFailed("model endpoint returned 503".into()),
                ))
            } else {
                Ok("Stub answer.".to_string())
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_summarized: 0,
                questions_answered: 0,
                chunks_indexed: 0,
            }
        }
    }

    async fn test_harness(
        fail_summarize: bool,
    ) -> (TempDir, DocumentStore, Arc<StubSummarizer>, Router) {
        test_harness_with(StubSummarizer::new(fail_summarize)).await
    }

    async fn test_harness_with(
        stub: StubSummarizer,
    ) -> (TempDir, DocumentStore, Arc<StubSummarizer>, Router) {
        let dir = TempDir::new().expect("tempdir");
        let store = DocumentStore::connect(&dir.path().join("api.db"), &dir.path().join("media"))
            .await
            .expect("store connects");
        let service = Arc::new(stub);
        let router = create_router(store.clone(), service.clone());
        (dir, store, service, router)
    }

    fn multipart_upload(file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "docsum-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/summarize/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn ask_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/ask/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn summarize_persists_record_and_summary() {
        let (_dir, store, service, router) = test_harness(false).await;

        let response = router
            .oneshot(multipart_upload("report.pdf", b"%PDF-1.4 body"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["summary"], "Stub summary.");
        assert!(json["file"].as_str().unwrap().ends_with("report.pdf"));
        assert!(json["uploaded_at"].as_str().is_some());

        let id = json["id"].as_i64().expect("id");
        let stored = store.get(id).await.expect("record exists");
        assert_eq!(stored.summary.as_deref(), Some("Stub summary."));
        assert_eq!(service.recorded_calls().await, vec![Call::Summarize(id)]);
    }

    #[tokio::test]
    async fn summarize_failure_removes_the_created_record() {
        let (_dir, store, _service, router) = test_harness(true).await;
        let before = store.count().await.unwrap();

        let response = router
            .oneshot(multipart_upload("report.pdf", b"%PDF-1.4 body"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("EmptyResult:"));
        assert!(message.contains("No document content was found"));

        // Compensating delete ran: no orphan record survives a failed request.
        assert_eq!(store.count().await.unwrap(), before);
    }

    #[tokio::test]
    async fn summarize_without_file_field_is_400() {
        let (_dir, store, service, router) = test_harness(false).await;

        let boundary = "docsum-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/summarize/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");

        let response = router.oneshot(request).await.expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn summarize_rejects_non_pdf_upload() {
        let (_dir, _store, service, router) = test_harness(false).await;

        let response = router
            .oneshot(multipart_upload("notes.txt", b"not a pdf"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn ask_missing_fields_is_400_before_any_downstream_call() {
        let (_dir, _store, service, router) = test_harness(false).await;

        let response = router
            .oneshot(ask_request(serde_json::json!({ "question": "What?" })))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Document ID and question are required.");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn ask_unknown_document_is_404_without_downstream_call() {
        let (_dir, _store, service, router) = test_harness(false).await;

        let response = router
            .oneshot(ask_request(
                serde_json::json!({ "document_id": 4242, "question": "What?" }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Document not found.");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn ask_returns_answer_for_stored_document() {
        let (_dir, store, service, router) = test_harness(false).await;
        let doc = store.save("paper.pdf", b"%PDF-1.4").await.unwrap();

        let response = router
            .oneshot(ask_request(serde_json::json!({
                "document_id": doc.id,
                "question": "What is the main topic?"
            })))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["answer"], "Stub answer.");
        assert_eq!(
            service.recorded_calls().await,
            vec![Call::Answer(doc.id, "What is the main topic?".into())]
        );
    }

    #[tokio::test]
    async fn ask_failure_reports_bare_message_without_error_class() {
        let (_dir, store, _service, router) =
            test_harness_with(StubSummarizer::with_failing_answers()).await;
        let doc = store.save("paper.pdf", b"%PDF-1.4").await.unwrap();

        let response = router
            .oneshot(ask_request(serde_json::json!({
                "document_id": doc.id,
                "question": "What is the main topic?"
            })))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        // Unlike summarize, ask responses carry the message alone.
        assert_eq!(
            json["error"],
            "Failed to generate text: model endpoint returned 503"
        );
    }

    #[tokio::test]
    async fn ask_treats_document_id_zero_as_a_lookup() {
        let (_dir, _store, service, router) = test_harness(false).await;

        let response = router
            .oneshot(ask_request(
                serde_json::json!({ "document_id": 0, "question": "What?" }),
            ))
            .await
            .expect("router response");

        // Zero is a well-formed id that simply matches no record.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Document not found.");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_counters() {
        let (_dir, _store, _service, router) = test_harness(false).await;

        let request = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["documents_summarized"], 0);
        assert_eq!(json["questions_answered"], 0);
    }
}
