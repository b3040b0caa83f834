//! Error types for the homecare assistants and the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("embedding API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u64, actual: u64 },
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Api { retryable, .. } => *retryable,
            // Non-success responses arrive as `Api`; transport failures are not throttling.
            EmbeddingError::RequestError(_)
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to Qdrant: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionCreation(String),

    #[error("upsert error: {message}")]
    UpsertError { message: String, retryable: bool },

    #[error("Qdrant client error: {0}")]
    ClientError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        // Connection and schema problems are misconfiguration, not load.
        matches!(
            self,
            VectorStoreError::UpsertError {
                retryable: true,
                ..
            }
        )
    }
}

/// Errors raised while extracting text from a single PDF.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse PDF: {0}")]
    Parse(String),
}

/// Errors raised by the chat-completion and image-analysis provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("provider is not configured: {0}")]
    NotConfigured(String),
}

/// Failure of one batch: either its embeddings or its upsert.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

impl Retryable for BatchError {
    fn is_retryable(&self) -> bool {
        match self {
            BatchError::Embedding(e) => e.is_retryable(),
            BatchError::VectorStore(e) => e.is_retryable(),
        }
    }
}

/// Errors that terminate a whole ingestion run.
///
/// File- and batch-level failures never surface here; they are recorded in the
/// [`IngestionReport`](crate::models::IngestionReport) instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("vector store unreachable: {0}")]
    Connection(String),

    #[error("collection setup failed: {0}")]
    Collection(String),

    #[error(
        "embedding model produces {embedder}-dimensional vectors but the collection expects {collection}"
    )]
    DimensionMismatch { embedder: u64, collection: u64 },

    #[error("cannot read folder {}: {message}", path.display())]
    Folder { path: PathBuf, message: String },
}

impl From<VectorStoreError> for IngestError {
    fn from(error: VectorStoreError) -> Self {
        match error {
            VectorStoreError::ConnectionError(msg) => IngestError::Connection(msg),
            other => IngestError::Collection(other.to_string()),
        }
    }
}
