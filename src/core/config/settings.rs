//! Typed view of the merged configuration tree.
//!
//! Every field carries a default so a bare deployment with only
//! `OPENAI_API_KEY` set still starts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub generation: GenerationConfig,
    pub rag: RagConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_key: None,
            cors_allowed_origins: vec![
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8501".to_string(),
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Falls back to `<data_dir>/chillpanda.db` when unset.
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 300,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub enabled: bool,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub similarity_threshold: f64,
    pub top_k: usize,
    pub index_name: String,
    /// Data-plane host of the index; resolved through the control plane when unset.
    pub index_host: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub control_plane_url: String,
    pub cloud: String,
    pub region: String,
    pub namespace: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimension: 1536,
            similarity_threshold: 0.7,
            top_k: 3,
            index_name: "chill-panda-index".to_string(),
            index_host: None,
            pinecone_api_key: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            namespace: None,
            timeout_secs: 10,
        }
    }
}

impl RagConfig {
    /// Retrieval only runs when it is enabled and the index is reachable.
    pub fn is_active(&self) -> bool {
        self.enabled
            && self
                .pinecone_api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages fetched from the store for each turn.
    pub max_history: i64,
    /// Turns of that history forwarded to the model.
    pub prompt_history_turns: usize,
    /// Default page size for the conversation endpoint.
    pub max_history_display: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 10,
            prompt_history_turns: 6,
            max_history_display: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
