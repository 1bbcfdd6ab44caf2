//! Configuration for the answer pipeline.

use docqa_embeddings::{DEFAULT_BATCH_SIZE, DEFAULT_DIMENSION};
use docqa_generation::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ModelTiers};
use docqa_retrieval::{DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the answer pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Key for the embedding and chat APIs. Falls back to `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Vector store connection.
    pub vector_store: VectorStoreConfig,

    /// Retrieval limits.
    pub retrieval: RetrievalConfig,

    /// Answer generation configuration.
    pub generation: GenerationConfig,
}

impl PipelineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Defaults overridden by `OPENAI_API_KEY`, `QDRANT_URL` and
    /// `QDRANT_API_KEY` when they are set.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = non_empty_var("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = non_empty_var("QDRANT_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        self
    }

    /// Set the retrieval configuration.
    pub fn with_retrieval(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    /// Set the generation configuration.
    pub fn with_generation(mut self, config: GenerationConfig) -> Self {
        self.generation = config;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,

    /// Must match the vector collection's dimension.
    pub dimension: usize,

    /// Texts per provider request when embedding many passages.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Vector store connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            api_key: None,
        }
    }
}

/// Retrieval limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum passages handed to the generator.
    pub top_k: usize,

    /// Minimum similarity for a passage to count as relevant.
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.7,
        }
    }
}

/// Answer generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub simple_model: String,
    pub complex_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationConfig {
    /// Models keyed by question complexity.
    pub fn model_tiers(&self) -> ModelTiers {
        ModelTiers {
            simple: self.simple_model.clone(),
            complex: self.complex_model.clone(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let tiers = ModelTiers::default();
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            simple_model: tiers.simple,
            complex_model: tiers.complex,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}
