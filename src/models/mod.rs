mod category;
mod chat;
mod config;
mod document;
mod format;
mod report;

pub use category::Category;
pub use chat::{ChatMessage, Role};
pub use config::{
    ChatConfig, Config, DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION_BASE, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL, IngestionConfig, Metric, OpenAiConfig,
    OutputConfig, VectorStoreConfig,
};
pub use document::{Batch, Chunk, Document, Page, VectorPoint};
pub use format::OutputFormat;
pub use report::{BatchResult, FileOutcome, FileReport, IngestionReport};
