//! Embedding providers.
//!
//! A provider turns an ordered list of texts into an ordered list of vectors,
//! one per input. Large inputs go through [`EmbeddingProvider::embed_batched`],
//! which splits them into contiguous groups and calls the provider once per
//! group, sequentially.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_DIMENSION, Embedding};

/// Progress report emitted after each completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Number of texts embedded so far.
    pub processed: usize,

    /// Total number of texts in the call.
    pub total: usize,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model this provider embeds with.
    fn model(&self) -> &str;

    /// Get the embedding dimension produced by the model.
    fn dimension(&self) -> usize;

    /// Embed every text, returning one vector per input in input order.
    ///
    /// An empty input must return an empty output without contacting the
    /// underlying service.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    /// Embed texts in contiguous groups of at most `batch_size`.
    async fn embed_batched(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        self.embed_batched_with_progress(texts, batch_size, &mut |_| {})
            .await
    }

    /// Like [`EmbeddingProvider::embed_batched`], reporting progress after
    /// every completed group.
    ///
    /// Groups are processed one after another; the first failure is returned
    /// as-is and no retry is attempted.
    async fn embed_batched_with_progress(
        &self,
        texts: &[String],
        batch_size: usize,
        on_progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<Vec<Embedding>> {
        let batch_size = batch_size.max(1);
        let total = texts.len();
        let mut results = Vec::with_capacity(total);

        for batch in texts.chunks(batch_size) {
            let embeddings = self.embed(batch).await?;
            results.extend(embeddings);

            let progress = BatchProgress {
                processed: results.len(),
                total,
            };
            info!(
                "Batch embedding progress: {}/{}",
                progress.processed, progress.total
            );
            on_progress(progress);
        }

        Ok(results)
    }

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to embed with.
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => DEFAULT_DIMENSION,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        debug!(
            "Generating embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let body = OpenAIEmbeddingRequest {
            input: texts,
            model: &self.model,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest {
                status: status.as_u16(),
                body,
            });
        }

        let result: OpenAIEmbeddingResponse = response.json().await?;
        let embeddings = result.into_embeddings(texts.len())?;

        info!(
            "Generated {} embeddings ({} dimensions)",
            embeddings.len(),
            embeddings.first().map_or(0, Vec::len)
        );

        Ok(embeddings)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'a str,
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

impl OpenAIEmbeddingResponse {
    fn into_embeddings(self, expected_len: usize) -> Result<Vec<Embedding>> {
        if self.data.len() != expected_len {
            return Err(EmbeddingError::InvalidResponse(format!(
                "provider returned {} embeddings for {expected_len} inputs",
                self.data.len()
            )));
        }

        let mut data = self.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Embeds `"text-N"` as `[N]` and records the size of every call.
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording-model"
        }

        fn dimension(&self) -> usize {
            1
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| vec![t.trim_start_matches("text-").parse::<f32>().unwrap()])
                .collect())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    /// Fails on the second call.
    struct FlakyProvider {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-model"
        }

        fn dimension(&self) -> usize {
            1
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 2 {
                return Err(EmbeddingError::RateLimited {
                    retry_after_secs: 5,
                });
            }
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text-{i}")).collect()
    }

    #[tokio::test]
    async fn test_batched_empty_input_makes_no_calls() {
        let provider = RecordingProvider::default();
        let mut reports = Vec::new();

        let result = provider
            .embed_batched_with_progress(&[], 10, &mut |p| reports.push(p))
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(provider.calls.lock().unwrap().is_empty());
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_batched_preserves_order_with_uneven_batches() {
        let provider = RecordingProvider::default();
        let mut reports = Vec::new();

        let result = provider
            .embed_batched_with_progress(&texts(7), 3, &mut |p| reports.push(p.processed))
            .await
            .unwrap();

        let flat: Vec<f32> = result.into_iter().flatten().collect();
        assert_eq!(flat, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(*provider.calls.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(reports, vec![3, 6, 7]);
    }

    #[tokio::test]
    async fn test_batched_batch_larger_than_input() {
        let provider = RecordingProvider::default();
        let result = provider.embed_batched(&texts(4), 100).await.unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(*provider.calls.lock().unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_batched_zero_batch_size_is_treated_as_one() {
        let provider = RecordingProvider::default();
        let result = provider.embed_batched(&texts(3), 0).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(*provider.calls.lock().unwrap(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_batched_fails_fast() {
        let provider = FlakyProvider {
            calls: Mutex::new(0),
        };
        let err = provider.embed_batched(&texts(5), 2).await.unwrap_err();

        assert!(matches!(err, EmbeddingError::RateLimited { .. }));
        assert_eq!(*provider.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_openai_embed_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                ],
                "usage": { "prompt_tokens": 2, "total_tokens": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let result = provider
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_openai_empty_input_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());

        assert!(provider.embed(&[]).await.unwrap().is_empty());
        assert!(provider.embed_batched(&[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_openai_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let err = provider.embed_query("hello").await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 12
            }
        ));
    }

    #[tokio::test]
    async fn test_openai_count_mismatch_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "index": 0, "embedding": [1.0] } ]
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let err = provider
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_openai_server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let err = provider.embed_query("hello").await.unwrap_err();

        match err {
            EmbeddingError::ApiRequest { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_openai_missing_key() {
        let mut provider = OpenAIProvider::new();
        provider.api_key = None;

        assert!(!provider.is_available());
        let err = provider.embed_query("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }

    #[test]
    fn test_openai_provider_dimensions() {
        assert_eq!(OpenAIProvider::new().dimension(), 1536);
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.dimension(), 3072);
    }
}
