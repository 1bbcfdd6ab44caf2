//! The answer generation capability.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::complexity::Complexity;
use crate::error::Result;

/// Default sampling temperature; low to keep answers close to the context.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default bound on answer length, in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// A prompt plus sampling overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a request using the generator's default sampling settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Override the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the maximum answer length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A completed, non-streamed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub model_used: String,
    pub token_count: u64,
    pub latency_ms: u64,
}

/// An item of a streamed generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The next piece of answer text.
    Fragment(String),

    /// Token usage, reported once near the end when the provider supports it.
    Usage { total_tokens: u64 },
}

/// A finite stream of answer events. Dropping it abandons the generation.
pub type AnswerStream = BoxStream<'static, Result<StreamEvent>>;

/// Model names per complexity tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTiers {
    pub simple: String,
    pub complex: String,
}

impl ModelTiers {
    /// Model to use for `tier`.
    pub fn model_for(&self, tier: Complexity) -> &str {
        match tier {
            Complexity::Simple => &self.simple,
            Complexity::Complex => &self.complex,
        }
    }
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            simple: "gpt-4o-mini".to_string(),
            complex: "gpt-4o".to_string(),
        }
    }
}

/// Produces answers to prompts at a caller-chosen tier.
///
/// Failures are returned unchanged; implementations never retry or fall
/// back to another tier on their own.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Model used for `tier`.
    fn model_for(&self, tier: Complexity) -> &str;

    /// Generate the whole answer in one response.
    async fn generate(&self, request: &GenerationRequest, tier: Complexity) -> Result<Generation>;

    /// Start a fresh streamed generation.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        tier: Complexity,
    ) -> Result<AnswerStream>;
}
