use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maps text to fixed-dimension vectors. One capability consumed identically
/// by the ingestion and query paths.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embeds a batch, preserving input order and cardinality.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for Ollama's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| EmbedError::Service(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.into(),
            dimensions,
        })
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), EmbedError> {
        if vector.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Service("model returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|error| EmbedError::Service(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Service(format!(
                "{} returned {status}",
                self.endpoint
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|error| EmbedError::Service(error.to_string()))?;

        if payload.embeddings.len() != texts.len() {
            return Err(EmbedError::Service(format!(
                "model returned {} embeddings for {} inputs",
                payload.embeddings.len(),
                texts.len()
            )));
        }

        for vector in &payload.embeddings {
            self.check_dimensions(vector)?;
        }

        Ok(payload.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn batch_preserves_order_and_cardinality() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({
                    "embeddings": [[1.0, 0.0], [0.0, 1.0]]
                }));
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "test-model", 2, Duration::from_secs(5)).expect("client");
        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .expect("batch should succeed");

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_before_use() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({
                    "embeddings": [[1.0, 0.0, 0.5]]
                }));
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "test-model", 2, Duration::from_secs(5)).expect("client");
        let result = embedder.embed("hello").await;

        match result {
            Err(EmbedError::DimensionMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cardinality_mismatch_is_a_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [[1.0, 0.0]] }));
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "test-model", 2, Duration::from_secs(5)).expect("client");
        let result = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;

        assert!(matches!(result, Err(EmbedError::Service(_))));
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("model not loaded");
            })
            .await;

        let embedder = OllamaEmbedder::new(&server.base_url(), "test-model", 2, Duration::from_secs(5)).expect("client");
        assert!(matches!(
            embedder.embed("hello").await,
            Err(EmbedError::Service(_))
        ));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        let embedder = OllamaEmbedder::new("http://localhost:1", "test-model", 2, Duration::from_secs(5)).expect("client");
        let vectors = embedder.embed_batch(&[]).await.expect("empty batch");
        assert!(vectors.is_empty());
    }
}
