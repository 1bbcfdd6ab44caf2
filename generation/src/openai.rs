//! OpenAI chat completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{StreamExt, future, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::complexity::Complexity;
use crate::error::{GenerationError, Result};
use crate::generator::{
    AnswerGenerator, AnswerStream, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, Generation,
    GenerationRequest, ModelTiers, StreamEvent,
};

/// Marker the API sends as the final SSE payload.
const DONE_MARKER: &str = "[DONE]";

/// [`AnswerGenerator`] backed by the OpenAI chat completions API.
pub struct OpenAIChat {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Models per tier.
    models: ModelTiers,

    /// Temperature when the request does not set one.
    temperature: f32,

    /// Max tokens when the request does not set one.
    max_tokens: u32,
}

impl OpenAIChat {
    /// Create a new client, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            models: ModelTiers::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
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

    /// Set the models per tier.
    pub fn with_models(mut self, models: ModelTiers) -> Self {
        self.models = models;
        self
    }

    /// Set the default temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default maximum answer length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Check if the client has credentials.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GenerationError::ProviderNotConfigured)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiRequest {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    fn body<'a>(
        &'a self,
        request: &'a GenerationRequest,
        tier: Complexity,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: self.models.model_for(tier),
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

impl Default for OpenAIChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIChat {
    fn model_for(&self, tier: Complexity) -> &str {
        self.models.model_for(tier)
    }

    async fn generate(&self, request: &GenerationRequest, tier: Complexity) -> Result<Generation> {
        let started = Instant::now();
        let body = self.body(request, tier, false);
        info!("Generating answer with {} ({tier:?})", body.model);

        let response = self.send(&body).await?;
        let parsed: ChatResponse = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();
        let token_count = parsed.usage.map_or(0, |u| u.total_tokens);
        let latency_ms = saturating_millis(started.elapsed());

        info!("Answer generated: {token_count} tokens in {latency_ms}ms");

        Ok(Generation {
            text,
            model_used: body.model.to_string(),
            token_count,
            latency_ms,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        tier: Complexity,
    ) -> Result<AnswerStream> {
        let body = self.body(request, tier, true);
        info!("Starting answer stream with {} ({tier:?})", body.model);

        let response = self.send(&body).await?;

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|event| match event {
                Ok(event) => parse_chunk(&event.data),
                Err(err) => Err(GenerationError::Stream(err.to_string())),
            })
            .take_while(|chunk| future::ready(!matches!(chunk, Ok(SseChunk::Done))))
            .flat_map(|chunk| {
                let items: Vec<Result<StreamEvent>> = match chunk {
                    Ok(SseChunk::Events(events)) => events.into_iter().map(Ok).collect(),
                    Ok(SseChunk::Done) => Vec::new(),
                    Err(err) => vec![Err(err)],
                };
                stream::iter(items)
            })
            .boxed();

        Ok(events)
    }
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// One decoded SSE payload.
#[derive(Debug, PartialEq)]
enum SseChunk {
    Events(Vec<StreamEvent>),
    Done,
}

fn parse_chunk(data: &str) -> Result<SseChunk> {
    let data = data.trim();
    if data == DONE_MARKER {
        debug!("Answer stream completed");
        return Ok(SseChunk::Done);
    }

    let chunk: ChatStreamChunk = serde_json::from_str(data)?;
    let mut events = Vec::new();

    if let Some(content) = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
    {
        events.push(StreamEvent::Fragment(content));
    }
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage {
            total_tokens: usage.total_tokens,
        });
    }

    Ok(SseChunk::Events(events))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAIChat {
        OpenAIChat::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
    }

    #[test]
    fn test_latency_saturates_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_millis(1_250)), 1_250);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    fn sse(payloads: &[&str]) -> ResponseTemplate {
        let body: String = payloads
            .iter()
            .map(|p| format!("data: {p}\n\n"))
            .collect();
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
    }

    #[tokio::test]
    async fn test_generate_uses_tier_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "messages": [ { "role": "user", "content": "the prompt" } ],
                "max_tokens": 1000,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "Answer [1]." } }
                ],
                "usage": { "prompt_tokens": 20, "completion_tokens": 4, "total_tokens": 24 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generation = client(&server)
            .generate(&GenerationRequest::new("the prompt"), Complexity::Complex)
            .await
            .unwrap();

        assert_eq!(generation.text, "Answer [1].");
        assert_eq!(generation.model_used, "gpt-4o");
        assert_eq!(generation.token_count, 24);
    }

    #[tokio::test]
    async fn test_generate_request_overrides() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 50
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": null } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generation = client(&server)
            .generate(
                &GenerationRequest::new("p").with_max_tokens(50),
                Complexity::Simple,
            )
            .await
            .unwrap();

        assert_eq!(generation.text, "");
        assert_eq!(generation.token_count, 0);
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "stream_options": { "include_usage": true }
            })))
            .respond_with(sse(&[
                r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"Revenue rose"}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":" [1]."}}]}"#,
                r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
                "[DONE]",
                r#"{"choices":[{"index":0,"delta":{"content":"ignored"}}]}"#,
            ]))
            .expect(1)
            .mount(&server)
            .await;

        let stream = client(&server)
            .generate_stream(&GenerationRequest::new("p"), Complexity::Simple)
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.try_collect().await.unwrap();

        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment("Revenue rose".to_string()),
                StreamEvent::Fragment(" [1].".to_string()),
                StreamEvent::Usage { total_tokens: 15 },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_malformed_chunk_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse(&[
                r#"{"choices":[{"index":0,"delta":{"content":"ok"}}]}"#,
                "not json",
            ]))
            .mount(&server)
            .await;

        let mut stream = client(&server)
            .generate_stream(&GenerationRequest::new("p"), Complexity::Simple)
            .await
            .unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            StreamEvent::Fragment("ok".to_string())
        );
        assert!(matches!(
            stream.next().await,
            Some(Err(GenerationError::Serialization(_)))
        ));
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let result = client(&server)
            .generate_stream(&GenerationRequest::new("p"), Complexity::Complex)
            .await;

        match result {
            Err(GenerationError::ApiRequest { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn test_missing_key() {
        let mut chat = OpenAIChat::new();
        chat.api_key = None;

        let err = chat
            .generate(&GenerationRequest::new("p"), Complexity::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ProviderNotConfigured));
    }

    #[test]
    fn test_parse_chunk_done() {
        assert_eq!(parse_chunk(" [DONE] ").unwrap(), SseChunk::Done);
    }
}
