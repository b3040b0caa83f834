//! Vector store abstraction layer.
//!
//! The ingestion pipeline talks to the store through the [`VectorStore`] trait; Qdrant is the
//! only backend.

mod qdrant;

pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{Metric, VectorPoint, VectorStoreConfig};

/// Schema and size of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: u64,
    pub metric: Metric,
    pub points_count: u64,
}

impl CollectionInfo {
    /// Fail unless the collection was created with `dimension` and `metric`.
    pub fn check_schema(&self, dimension: u64, metric: Metric) -> Result<(), VectorStoreError> {
        if self.dimension != dimension || self.metric != metric {
            return Err(VectorStoreError::CollectionCreation(format!(
                "collection {} exists with dimension {} ({}), expected {} ({})",
                self.name, self.dimension, self.metric, dimension, metric
            )));
        }
        Ok(())
    }
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<(), VectorStoreError>;

    /// Returns None if the collection doesn't exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection if absent, or verify the schema of the existing one.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: u64,
        metric: Metric,
    ) -> Result<CollectionInfo, VectorStoreError>;

    /// Write every point of a batch. On error, assume nothing was committed.
    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError>;
}

/// Connect to the configured backend and verify it answers.
pub async fn connect(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    let backend = QdrantBackend::connect(config).await?;
    Ok(Arc::new(backend))
}

/// Collection name for a run started at `timestamp` (Unix seconds).
pub fn collection_name(base: &str, timestamp: i64) -> String {
    format!("{base}_{timestamp}")
}

/// Collection name for a run starting now.
pub fn timestamped_collection_name(base: &str) -> String {
    collection_name(base, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dimension: u64, metric: Metric) -> CollectionInfo {
        CollectionInfo {
            name: "Homecarepdf_1".to_string(),
            dimension,
            metric,
            points_count: 0,
        }
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(
            collection_name("Homecarepdf", 1_731_152_491),
            "Homecarepdf_1731152491"
        );
        assert_ne!(
            collection_name("Homecarepdf", 1_731_152_491),
            collection_name("Homecarepdf", 1_731_152_492)
        );
    }

    #[test]
    fn test_timestamped_collection_name_prefix() {
        let name = timestamped_collection_name("Manuals");
        let suffix = name.strip_prefix("Manuals_").unwrap();
        assert!(suffix.parse::<i64>().is_ok());
    }

    #[test]
    fn test_check_schema() {
        assert!(info(1536, Metric::Cosine).check_schema(1536, Metric::Cosine).is_ok());
        assert!(matches!(
            info(768, Metric::Cosine).check_schema(1536, Metric::Cosine),
            Err(VectorStoreError::CollectionCreation(_))
        ));
        assert!(info(1536, Metric::Dot).check_schema(1536, Metric::Cosine).is_err());
    }
}
