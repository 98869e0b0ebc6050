//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result; the dimension is taken from the first vector.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// What an embedding will be used for; the service tunes vectors per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed corpus passages (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Embed a single search query
    async fn embed_query(&self, query: &str) -> Result<Vec<f16>>;

    /// Get the dimension of embeddings produced by this provider (0 until known)
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Convert an f32 embedding to f16 and scale it to unit length.
///
/// Zero vectors are returned unchanged.
pub fn normalize_to_f16(embedding: &[f32]) -> Vec<f16> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    embedding
        .iter()
        .map(|&value| {
            if norm > 0.0 {
                f16::from_f32(value / norm)
            } else {
                f16::from_f32(value)
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Embedding provider backed by the Gemini `batchEmbedContents` endpoint
pub struct GeminiEmbeddingProvider {
    config: EmbedConfig,
    client: reqwest::Client,
    model_resource: String,
    dimension: OnceLock<usize>,
}

impl std::fmt::Debug for GeminiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEmbeddingProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension.get())
            .finish()
    }
}

impl GeminiEmbeddingProvider {
    /// Creates a provider after validating the configuration.
    ///
    /// No request is made here; the dimension is learned from the first response.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        tracing::info!(
            "Initialized Gemini embedding provider for model: {}",
            config.model_name
        );

        Ok(Self {
            model_resource: config.model_resource(),
            config,
            client,
            dimension: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    async fn embed_batch(&self, texts: &[String], task_type: TaskType) -> Result<Vec<Vec<f16>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model_resource,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.config.batch_endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!("Embedding service returned {}: {}", status, body);
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BatchEmbedResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::malformed(format!("invalid JSON: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        parsed
            .embeddings
            .into_iter()
            .map(|embedding| self.check_dimension(embedding.values))
            .collect()
    }

    fn check_dimension(&self, values: Vec<f32>) -> Result<Vec<f16>> {
        if values.is_empty() {
            return Err(EmbedError::malformed("empty embedding vector"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbedError::malformed("non-finite values in embedding"));
        }

        let expected = *self.dimension.get_or_init(|| {
            tracing::info!("Embedding dimension: {}", values.len());
            values.len()
        });
        if values.len() != expected {
            return Err(EmbedError::malformed(format!(
                "expected dimension {expected}, got {}",
                values.len()
            )));
        }

        Ok(normalize_to_f16(&values))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!("Processing batch of {} texts", batch.len());
            let embeddings = self.embed_batch(batch, TaskType::RetrievalDocument).await?;
            all_embeddings.extend(embeddings);
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f16>> {
        self.embed_batch(&[query.to_string()], TaskType::RetrievalQuery)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("no embedding generated for query"))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension.get().copied().unwrap_or(0)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const BATCH_PATH: &str = "/models/embedding-001:batchEmbedContents";

    fn provider_for(server: &mockito::ServerGuard) -> GeminiEmbeddingProvider {
        let config = EmbedConfig::new("test-key").with_base_url(server.url());
        GeminiEmbeddingProvider::new(config).unwrap()
    }

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert!(EmbeddingResult::new(vec![]).is_empty());
    }

    #[test]
    fn test_normalize_to_f16() {
        let normalized = normalize_to_f16(&[3.0, 4.0]);
        assert!((normalized[0].to_f32() - 0.6).abs() < 1e-3);
        assert!((normalized[1].to_f32() - 0.8).abs() < 1e-3);

        let zero = normalize_to_f16(&[0.0, 0.0]);
        assert!(zero.iter().all(|v| v.to_f32() == 0.0));
    }

    #[test]
    fn test_provider_requires_key() {
        let err = GeminiEmbeddingProvider::new(EmbedConfig::new("")).unwrap_err();
        assert!(matches!(err, EmbedError::MissingCredential));
    }

    #[tokio::test]
    async fn test_embed_texts_sends_document_task() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", BATCH_PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "requests": [
                    {
                        "model": "models/embedding-001",
                        "content": { "parts": [{ "text": "Business hours: 9am-5pm" }] },
                        "taskType": "RETRIEVAL_DOCUMENT"
                    },
                    {
                        "model": "models/embedding-001",
                        "content": { "parts": [{ "text": "Refund policy" }] },
                        "taskType": "RETRIEVAL_DOCUMENT"
                    }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embeddings":[{"values":[3.0,4.0,0.0]},{"values":[0.0,0.0,2.0]}]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        assert_eq!(provider.embedding_dimension(), 0);

        let texts = vec![
            "Business hours: 9am-5pm".to_string(),
            "Refund policy".to_string(),
        ];
        let result = provider.embed_texts(&texts).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert_eq!(provider.embedding_dimension(), 3);
        assert!((result.embeddings[0][0].to_f32() - 0.6).abs() < 1e-3);
        assert!((result.embeddings[1][2].to_f32() - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_embed_texts_splits_batches() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", BATCH_PATH)
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0,0.0]},{"values":[0.0,1.0]}]}"#)
            .expect(2)
            .create_async()
            .await;

        let config = EmbedConfig::new("test-key")
            .with_base_url(server.url())
            .with_batch_size(2);
        let provider = GeminiEmbeddingProvider::new(config).unwrap();

        let texts: Vec<String> = (0..4).map(|i| format!("passage {i}")).collect();
        let result = provider.embed_texts(&texts).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_embed_query_sends_query_task() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", BATCH_PATH)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "requests": [{ "taskType": "RETRIEVAL_QUERY" }]
            })))
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[0.0,5.0]}]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let embedding = provider.embed_query("What are your hours?").await.unwrap();

        mock.assert_async().await;
        assert_eq!(embedding.len(), 2);
        assert!((embedding[1].to_f32() - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", BATCH_PATH)
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let provider = provider_for(&server);
        let err = provider.embed_query("hello").await.unwrap_err();

        match err {
            EmbedError::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_truncated_error_body_is_a_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Read the whole request so the client is not cut off mid-send.
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 100\r\n\r\nshort")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let config = EmbedConfig::new("test-key").with_base_url(format!("http://{addr}"));
        let provider = GeminiEmbeddingProvider::new(config).unwrap();
        let err = provider.embed_query("hello").await.unwrap_err();

        assert!(matches!(err, EmbedError::Http { .. }), "got {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_responses_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("POST", BATCH_PATH)
            .with_status(200)
            .with_body(r#"{"embeddings":[]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let err = provider.embed_query("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", BATCH_PATH)
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0,0.0]},{"values":[1.0,0.0,0.0]}]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = provider.embed_texts(&texts).await.unwrap_err();
        assert!(matches!(err, EmbedError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let provider = GeminiEmbeddingProvider::new(
            EmbedConfig::new("test-key").with_base_url("http://127.0.0.1:1"),
        )
        .unwrap();
        let result = provider.embed_texts(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
