use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::format::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u64 = 1536;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_COLLECTION_BASE: &str = "Homecarepdf";

/// Distance metric of a vector collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Dot => write!(f, "dot"),
            Metric::Euclid => write!(f, "euclid"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("homecare").join("config.toml"))
    }

    /// Load the config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Override settings from environment variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("QDRANT_URL") {
            self.vector_store.url = Some(v);
        }
        if let Some(v) = get("QDRANT_API_KEY") {
            self.vector_store.api_key = Some(v);
        }
        if let Some(v) = get("QDRANT_TIMEOUT_SECS") {
            self.vector_store.timeout_secs = v.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("QDRANT_TIMEOUT_SECS is not a number: {v}"))
            })?;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        Ok(())
    }

    /// Check value ranges that do not depend on which command runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ing = &self.ingestion;
        if ing.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.chunk_size must be greater than 0".to_string(),
            ));
        }
        if ing.chunk_overlap >= ing.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "ingestion.chunk_overlap ({}) must be smaller than chunk_size ({})",
                ing.chunk_overlap, ing.chunk_size
            )));
        }
        if ing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.batch_size must be greater than 0".to_string(),
            ));
        }
        if ing.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.openai.embedding_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "openai.embedding_dimension must be greater than 0".to_string(),
            ));
        }
        if self.vector_store.collection_base.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection_base must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Qdrant URL and API key, both required before any ingestion attempt.
    pub fn require_vector_store(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .vector_store
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("QDRANT_URL".to_string()))?;
        let api_key = self
            .vector_store
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("QDRANT_API_KEY".to_string()))?;
        Ok((url, api_key))
    }

    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: u64,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_chat_model")]
    pub vision_model: String,

    #[serde(default = "default_vision_max_tokens")]
    pub vision_max_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u64 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_vision_max_tokens() -> u32 {
    500
}

fn default_timeout() -> u64 {
    60
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            chat_model: default_chat_model(),
            vision_model: default_chat_model(),
            vision_max_tokens: default_vision_max_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_collection_base")]
    pub collection_base: String,

    #[serde(default)]
    pub distance: Metric,
}

fn default_collection_base() -> String {
    DEFAULT_COLLECTION_BASE.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_timeout(),
            collection_base: default_collection_base(),
            distance: Metric::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_batch_size() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// User turns allowed per session.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Most recent messages sent to the model with each request.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_messages() -> usize {
    20
}

fn default_max_history() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_history: default_max_history(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}
