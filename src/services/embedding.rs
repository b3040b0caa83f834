//! Embedding client for generating text embeddings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, EmbeddingError};
use crate::models::OpenAiConfig;
use crate::utils::retry::is_rate_limited;

/// Text-to-vector collaborator used by the ingestion pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Length of the vectors this embedder produces.
    fn dimension(&self) -> u64;

    fn model(&self) -> &str;
}

/// Models whose output length is fixed and cannot be requested.
const FIXED_DIMENSION_MODELS: &[(&str, u64)] = &[("text-embedding-ada-002", 1536)];

/// Request body for the /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u64>,
}

/// Response from the /embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: u64,
    /// Whether to send `dimensions` with each request.
    request_dimension: bool,
}

impl OpenAiEmbedder {
    /// Create a new embedder; fails when no API key is configured.
    pub fn new(config: &OpenAiConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY".to_string()))?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ConfigError::ValidationError(format!("invalid OpenAI API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("HTTP client: {e}")))?;

        let fixed = FIXED_DIMENSION_MODELS
            .iter()
            .find(|(name, _)| *name == config.embedding_model)
            .map(|(_, dim)| *dim);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dimension: fixed.unwrap_or(config.embedding_dimension),
            request_dimension: fixed.is_none(),
        })
    }

    /// Get the base URL of the embeddings API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, input: Vec<String>) -> EmbedRequest<'_> {
        EmbedRequest {
            model: &self.model,
            input,
            dimensions: self.request_dimension.then_some(self.dimension),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.request(texts))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vectors = order_by_index(parsed.data, expected)?;
        debug!(count = vectors.len(), model = %self.model, "received embeddings");
        Ok(vectors)
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Restore input order and check every input got exactly one vector.
fn order_by_index(
    mut data: Vec<EmbedData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(EmbeddingError::InvalidResponse(
            "embedding indices are not contiguous".to_string(),
        ));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

/// Build the typed error for a non-success response.
///
/// Throttling is decided from the status and the structured `error.type`/`error.code`; the
/// message falls back to the raw body when it is not OpenAI-shaped JSON.
fn api_error(status: u16, body: &str) -> EmbeddingError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_default();
    let codes: Vec<&str> = [detail.kind.as_deref(), detail.code.as_deref()]
        .into_iter()
        .flatten()
        .collect();

    EmbeddingError::Api {
        status,
        retryable: is_rate_limited(Some(status), &codes),
        message: detail.message.unwrap_or_else(|| body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::retry::Retryable;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiEmbedder::new(&OpenAiConfig::default());
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_base_url_trimming() {
        let mut cfg = config();
        cfg.base_url = "http://localhost:8080/v1/".to_string();
        let embedder = OpenAiEmbedder::new(&cfg).unwrap();
        assert_eq!(embedder.base_url(), "http://localhost:8080/v1");
        assert_eq!(embedder.dimension(), 1536);
        assert_eq!(embedder.model(), "text-embedding-3-small");
    }

    #[test]
    fn test_request_includes_dimensions_for_v3_models() {
        let mut cfg = config();
        cfg.embedding_dimension = 512;
        let embedder = OpenAiEmbedder::new(&cfg).unwrap();
        let body = serde_json::to_value(embedder.request(vec!["leak".to_string()])).unwrap();
        assert_eq!(body["dimensions"], 512);
        assert_eq!(body["input"][0], "leak");
    }

    #[test]
    fn test_fixed_dimension_model() {
        let mut cfg = config();
        cfg.embedding_model = "text-embedding-ada-002".to_string();
        cfg.embedding_dimension = 768;
        let embedder = OpenAiEmbedder::new(&cfg).unwrap();
        assert_eq!(embedder.dimension(), 1536);

        let body = serde_json::to_value(embedder.request(vec!["x".to_string()])).unwrap();
        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn test_order_by_index() {
        let data = vec![
            EmbedData {
                index: 1,
                embedding: vec![1.0],
            },
            EmbedData {
                index: 0,
                embedding: vec![0.0],
            },
        ];
        assert_eq!(order_by_index(data, 2).unwrap(), vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_order_by_index_count_mismatch() {
        let data = vec![EmbedData {
            index: 0,
            embedding: vec![0.0],
        }];
        assert!(matches!(
            order_by_index(data, 3),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        match api_error(429, body) {
            EmbeddingError::Api { message, retryable, .. } => {
                assert_eq!(message, "You exceeded your current quota");
                assert!(retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match api_error(502, "  gateway timeout ") {
            EmbeddingError::Api { message, retryable, .. } => {
                assert_eq!(message, "gateway timeout");
                assert!(!retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_numbers_in_message_do_not_mark_throttling() {
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens, however you requested 14290 tokens","type":"invalid_request_error","param":null,"code":null}}"#;
        let err = api_error(400, body);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("14290 tokens"));
    }

    #[test]
    fn test_rate_limit_code_marks_throttling() {
        let body = r#"{"error":{"message":"Rate limit reached for requests","type":"requests","code":"rate_limit_exceeded"}}"#;
        assert!(api_error(429, body).is_retryable());
        assert!(api_error(503, body).is_retryable());
    }
}
