//! Qdrant vector store backend implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::{Qdrant, QdrantError};
use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
};
use tracing::{debug, info};

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{Metric, VectorPoint, VectorStoreConfig};
use crate::utils::retry::is_grpc_rate_limited;

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    timeout: Duration,
}

impl QdrantBackend {
    /// Build a client and verify the server answers within the configured timeout.
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| VectorStoreError::ConnectionError("QDRANT_URL is not set".into()))?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let mut builder = Qdrant::from_url(url)
            .timeout(timeout)
            .connect_timeout(timeout);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self { client, timeout };
        backend.health_check().await?;
        info!(url, "connected to Qdrant");
        Ok(backend)
    }
}

fn distance_for(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::Dot => Distance::Dot,
        Metric::Euclid => Distance::Euclid,
    }
}

fn metric_for(distance: i32) -> Option<Metric> {
    [Metric::Cosine, Metric::Dot, Metric::Euclid]
        .into_iter()
        .find(|m| distance_for(*m) as i32 == distance)
}

/// Payload stored with each point: the chunk text plus its provenance.
fn point_payload(
    point: &VectorPoint,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
    let chunk = &point.chunk;
    serde_json::from_value(serde_json::json!({
        "page_content": chunk.content,
        "metadata": {
            "source": chunk.source,
            "file_name": chunk.file_name,
            "page": chunk.page,
            "chunk_index": chunk.chunk_index,
            "document_id": chunk.document_id,
        },
    }))
}

/// Throttling is read from the gRPC status, never from message text.
fn is_throttled(error: &QdrantError) -> bool {
    match error {
        QdrantError::ResourceExhaustedError { .. } => true,
        QdrantError::ResponseError { status } => is_grpc_rate_limited(status.code()),
        _ => false,
    }
}

fn upsert_error(error: QdrantError) -> VectorStoreError {
    VectorStoreError::UpsertError {
        retryable: is_throttled(&error),
        message: error.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<(), VectorStoreError> {
        match tokio::time::timeout(self.timeout, self.client.health_check()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(VectorStoreError::ConnectionError(e.to_string())),
            Err(_) => Err(VectorStoreError::ConnectionError(format!(
                "no response within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| VectorStoreError::ClientError(e.to_string()))?;
        if !exists {
            return Ok(None);
        }

        let response = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| VectorStoreError::ClientError(e.to_string()))?;
        let info = response
            .result
            .ok_or_else(|| VectorStoreError::ClientError(format!("no info for {name}")))?;

        let vectors = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        let params = match vectors {
            Some(VectorsConfig::Params(params)) => params,
            Some(VectorsConfig::ParamsMap(_)) => {
                return Err(VectorStoreError::CollectionCreation(format!(
                    "collection {name} uses named vectors"
                )));
            }
            None => {
                return Err(VectorStoreError::ClientError(format!(
                    "collection {name} has no vector config"
                )));
            }
        };

        let metric = metric_for(params.distance).ok_or_else(|| {
            VectorStoreError::CollectionCreation(format!(
                "collection {name} uses an unsupported distance ({})",
                params.distance
            ))
        })?;

        Ok(Some(CollectionInfo {
            name: name.to_string(),
            dimension: params.size,
            metric,
            points_count: info.points_count.unwrap_or(0),
        }))
    }

    async fn ensure_collection(
        &self,
        name: &str,
        dimension: u64,
        metric: Metric,
    ) -> Result<CollectionInfo, VectorStoreError> {
        let existing = self.collection_info(name).await.map_err(|e| match e {
            VectorStoreError::ClientError(msg) => VectorStoreError::CollectionCreation(msg),
            other => other,
        })?;

        if let Some(info) = existing {
            info.check_schema(dimension, metric)?;
            debug!(collection = name, points = info.points_count, "reusing collection");
            return Ok(info);
        }

        let create = CreateCollectionBuilder::new(name)
            .vectors_config(VectorParamsBuilder::new(dimension, distance_for(metric)));

        self.client
            .create_collection(create)
            .await
            .map_err(|e| VectorStoreError::CollectionCreation(e.to_string()))?;

        info!(collection = name, dimension, %metric, "created collection");
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension,
            metric,
            points_count: 0,
        })
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let structs = points
            .iter()
            .map(|point| {
                let payload = point_payload(point).map_err(|e| VectorStoreError::UpsertError {
                    message: format!("payload for chunk {}: {e}", point.chunk.id),
                    retryable: false,
                })?;
                Ok(PointStruct::new(
                    point.chunk.id.clone(),
                    point.vector.clone(),
                    payload,
                ))
            })
            .collect::<Result<Vec<_>, VectorStoreError>>()?;

        let upsert = UpsertPointsBuilder::new(collection, structs).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(upsert_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn point() -> VectorPoint {
        VectorPoint {
            chunk: Chunk {
                id: Chunk::generate_id("doc", 3),
                document_id: "doc".to_string(),
                source: "/manuals/boiler.pdf".to_string(),
                file_name: "boiler.pdf".to_string(),
                page: 2,
                chunk_index: 3,
                start_offset: 0,
                overlap: 0,
                content: "Bleed the radiators once a year.".to_string(),
            },
            vector: vec![0.0; 4],
        }
    }

    #[test]
    fn test_metric_distance_mapping() {
        for metric in [Metric::Cosine, Metric::Dot, Metric::Euclid] {
            assert_eq!(metric_for(distance_for(metric) as i32), Some(metric));
        }
        assert_eq!(metric_for(Distance::Manhattan as i32), None);
    }

    #[test]
    fn test_point_payload_layout() {
        let payload = point_payload(&point()).unwrap();
        assert!(payload.contains_key("page_content"));
        assert!(payload.contains_key("metadata"));
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_upsert_error_classification() {
        let err = upsert_error(QdrantError::from(tonic::Status::resource_exhausted(
            "too many writes",
        )));
        assert!(matches!(err, VectorStoreError::UpsertError { retryable: true, .. }));

        let err = upsert_error(QdrantError::ResourceExhaustedError {
            status: tonic::Status::resource_exhausted("rate limiter"),
            retry_after_seconds: 2,
        });
        assert!(matches!(err, VectorStoreError::UpsertError { retryable: true, .. }));

        let err = upsert_error(QdrantError::from(tonic::Status::invalid_argument(
            "wrong vector size",
        )));
        assert!(matches!(err, VectorStoreError::UpsertError { retryable: false, .. }));
    }

    #[test]
    fn test_collection_name_digits_do_not_mark_throttling() {
        let err = upsert_error(QdrantError::from(tonic::Status::not_found(
            "Collection `Homecarepdf_1760429311` doesn't exist!",
        )));
        match err {
            VectorStoreError::UpsertError { message, retryable } => {
                assert!(!retryable);
                assert!(message.contains("Homecarepdf_1760429311"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
