//! Text-generation client for the hosted language model.
//!
//! Mirrors the embedding adapter: a thin reqwest wrapper around the hosted
//! inference API, returning the generated text verbatim. Generation is capped
//! at 512 new tokens with a low temperature to keep summaries stable across
//! repeated requests.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Maximum number of tokens the model may generate per request.
pub const MAX_NEW_TOKENS: u32 = 512;
/// Sampling temperature used for all generation requests.
pub const TEMPERATURE: f32 = 0.1;

/// Errors surfaced while attempting text generation.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider returned an error response or was unreachable.
    #[error("Failed to generate text: {0}")]
    RequestFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt assembled by the pipeline (context plus instruction).
    pub prompt: String,
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate text for the supplied prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Generation adapter backed by the hosted inference API.
pub struct HfGenerationClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_token: String,
    pub(crate) model: String,
}

impl HfGenerationClient {
    /// Construct a client from the loaded configuration.
    pub fn new() -> Result<Self, GenerationClientError> {
        let config = get_config();
        let http = Client::builder()
            .user_agent("docsum/0.1")
            .build()
            .map_err(|err| GenerationClientError::RequestFailed(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.hf_inference_url.clone(),
            api_token: config.hf_api_token.clone(),
            model: config.generation_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[async_trait]
impl GenerationClient for HfGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        tracing::debug!(model = %self.model, prompt_chars = request.prompt.len(), "Requesting generation");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_token)
            .json(&json!({
                "inputs": request.prompt,
                "parameters": {
                    "max_new_tokens": MAX_NEW_TOKENS,
                    "temperature": TEMPERATURE,
                    "return_full_text": false
                },
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|err| GenerationClientError::RequestFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::RequestFailed(format!(
                "generation endpoint returned {status}: {body}"
            )));
        }

        let outputs: Vec<GeneratedText> = response
            .json()
            .await
            .map_err(|err| GenerationClientError::InvalidResponse(err.to_string()))?;

        outputs
            .into_iter()
            .next()
            .map(|output| output.generated_text)
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("provider returned no candidates".into())
            })
    }
}
