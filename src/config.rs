use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docsum server.
///
/// Loaded once at process start; every downstream component reads from the
/// shared instance instead of touching the environment again.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the persistent Qdrant collection holding document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Bearer token for the hosted inference API.
    pub hf_api_token: String,
    /// Base URL of the hosted inference API.
    pub hf_inference_url: String,
    /// Sentence-embedding model identifier.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Text-generation model identifier.
    pub generation_model: String,
    /// Character budget per chunk.
    pub chunk_size: usize,
    /// Character overlap between adjacent chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub search_top_k: usize,
    /// Directory where uploaded files are persisted.
    pub media_root: String,
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Maximum seconds to wait for a freshly created collection to report ready.
    pub index_ready_timeout_secs: u64,
}

const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_GENERATION_MODEL: &str = "meta-llama/Llama-3.1-8B";
const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            hf_api_token: load_env("HF_API_TOKEN")?,
            hf_inference_url: load_env_optional("HF_INFERENCE_URL")
                .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string()),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?.unwrap_or(384),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(1000),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(200),
            search_top_k: parse_optional("SEARCH_TOP_K")?.unwrap_or(5),
            media_root: load_env_optional("MEDIA_ROOT").unwrap_or_else(|| "media".to_string()),
            database_path: load_env_optional("DATABASE_PATH")
                .unwrap_or_else(|| "data/docsum.db".to_string()),
            server_port: parse_optional("SERVER_PORT")?,
            index_ready_timeout_secs: parse_optional("INDEX_READY_TIMEOUT_SECS")?.unwrap_or(30),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Returns an error when a required credential is absent so misconfiguration
/// surfaces at startup rather than deep inside a request handler.
pub fn init_config() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_model = %config.embedding_model,
        generation_model = %config.generation_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).ok();
    Ok(())
}
