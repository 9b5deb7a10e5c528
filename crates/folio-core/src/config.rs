//! Configuration types for folio.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::traits::ChunkConfig;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Passage search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Conversational agent configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Web search configuration.
    #[serde(default)]
    pub web: WebSearchConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Batch size for embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Embedding dimension of the model.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            batch_size: default_batch_size(),
            num_threads: default_num_threads(),
            dimension: default_dimension(),
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Token overlap between consecutive chunks of one chapter.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Token encoding: a hub tokenizer id, a path to `tokenizer.json`,
    /// or `whitespace`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            encoding: default_encoding(),
        }
    }
}

impl ChunkingConfig {
    /// Token budget for the assembler.
    pub fn budget(&self) -> ChunkConfig {
        ChunkConfig {
            max_tokens: self.max_tokens,
            overlap_tokens: self.overlap_tokens,
        }
    }
}

/// Passage search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Passages returned by `search_documents`.
    #[serde(default = "default_passage_limit")]
    pub passage_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            passage_limit: default_passage_limit(),
        }
    }
}

/// Conversational agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum model invocations per user turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional system prompt sent ahead of the conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_iterations: default_max_iterations(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
        }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Instant-answer API endpoint.
    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,

    /// Maximum related topics included in a result.
    #[serde(default = "default_web_max_results")]
    pub max_results: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_web_endpoint(),
            max_results: default_web_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Default value functions

fn default_busy_timeout() -> u32 {
    30000
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_dimension() -> usize {
    768
}

fn default_max_tokens() -> usize {
    500
}

fn default_overlap_tokens() -> usize {
    75
}

fn default_encoding() -> String {
    // cl100k_base vocabulary
    "Xenova/gpt-4".to_string()
}

fn default_passage_limit() -> usize {
    20
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "moonshotai/kimi-k2-instruct-0905".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_max_iterations() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_web_endpoint() -> String {
    "https://api.duckduckgo.com/".to_string()
}

fn default_web_max_results() -> usize {
    5
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
        .join("folio.db")
}

fn default_model_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
        .join("models")
        .join("all-mpnet-base-v2")
}

impl FolioConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::error::FolioError::Config {
            message: format!("Failed to parse config {}: {}", path.display(), e),
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("folio").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        let local_config = PathBuf::from("folio.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }
}
