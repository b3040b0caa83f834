pub mod chat;
pub mod embedding;
pub mod extractor;
pub mod pipeline;
pub mod provider;
pub mod splitter;
pub mod vector_store;

pub use chat::{ChatSession, IMAGE_REQUEST, Turn};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use extractor::{PdfExtractor, PdfTextExtractor};
pub use pipeline::{IngestEvent, IngestionPipeline};
pub use provider::{ChatProvider, OpenAiProvider, image_data_url, image_mime_type};
pub use splitter::ChunkSplitter;
pub use vector_store::{
    CollectionInfo, QdrantBackend, VectorStore, collection_name, connect as connect_vector_store,
    timestamped_collection_name,
};
