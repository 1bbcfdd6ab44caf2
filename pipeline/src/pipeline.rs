//! The question-answering flow: embed, retrieve, prompt, generate, cite.

use std::sync::Arc;
use std::time::Instant;

use docqa_embeddings::{EmbeddingProvider, OpenAIProvider};
use docqa_generation::{AnswerGenerator, GenerationRequest, OpenAIChat, StreamEvent, classify};
use docqa_retrieval::{PassageInput, PassageRetriever, QdrantIndex, RetrievedPassage};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::citation::{Citation, extract_citation_numbers, map_citations};
use crate::config::{GenerationConfig, PipelineConfig, RetrievalConfig};
use crate::error::{PipelineError, Result};
use crate::prompt::{PromptPassage, build_prompt};

/// Answer returned when no passage clears the relevance threshold.
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find any relevant information in your documents to answer this question.";

/// `model_used` when no model was invoked.
pub const NO_MODEL: &str = "none";

/// A user's question, scoped to their documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub question: String,
    pub user_id: String,

    /// Restrict retrieval to these documents; empty means all of the user's.
    #[serde(default)]
    pub document_ids: Vec<String>,
}

impl Query {
    pub fn new(question: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            user_id: user_id.into(),
            document_ids: Vec::new(),
        }
    }

    /// Restrict the query to `document_ids`.
    pub fn with_documents<I, S>(mut self, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_ids = document_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// The outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub model_used: String,
    pub token_count: u64,
    pub latency_ms: u64,
}

/// Passage text for [`AnswerPipeline::store_document`]; the vector is
/// computed by the pipeline's embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPassage {
    pub content: String,
    pub page_number: Option<u32>,
    pub chunk_index: u32,
    pub token_count: u32,
}

/// Coordinates the embedding, retrieval and generation capabilities.
///
/// Runs share nothing but the capabilities themselves, so one pipeline can
/// serve concurrent questions.
pub struct AnswerPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: PassageRetriever,
    generator: Arc<dyn AnswerGenerator>,
    retrieval: RetrievalConfig,
    temperature: f32,
    max_tokens: u32,
    batch_size: usize,
}

impl AnswerPipeline {
    /// Create a pipeline with default retrieval and sampling settings.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        retriever: PassageRetriever,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let generation = GenerationConfig::default();
        Self {
            embedder,
            retriever,
            generator,
            retrieval: RetrievalConfig::default(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            batch_size: docqa_embeddings::DEFAULT_BATCH_SIZE,
        }
    }

    /// Build the OpenAI and Qdrant backed pipeline described by `config`.
    ///
    /// Fails when the embedding model's dimension differs from the
    /// configured collection dimension, since every query would then be
    /// rejected by the retriever.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut embedder = OpenAIProvider::new()
            .with_base_url(&config.embedding.base_url)
            .with_model(&config.embedding.model);
        if embedder.dimension() != config.embedding.dimension {
            return Err(PipelineError::Config(format!(
                "embedding model {} produces {} dimensions but the collection is configured for {}",
                config.embedding.model,
                embedder.dimension(),
                config.embedding.dimension
            )));
        }

        let mut index = QdrantIndex::new(&config.vector_store.url, &config.vector_store.collection);
        let mut generator = OpenAIChat::new()
            .with_base_url(&config.generation.base_url)
            .with_models(config.generation.model_tiers())
            .with_temperature(config.generation.temperature)
            .with_max_tokens(config.generation.max_tokens);

        if let Some(key) = &config.openai_api_key {
            embedder = embedder.with_api_key(key);
            generator = generator.with_api_key(key);
        }
        if let Some(key) = &config.vector_store.api_key {
            index = index.with_api_key(key);
        }

        let retriever = PassageRetriever::new(Arc::new(index), config.embedding.dimension);
        Ok(
            Self::new(Arc::new(embedder), retriever, Arc::new(generator))
                .with_retrieval(config.retrieval.clone())
                .with_sampling(config.generation.temperature, config.generation.max_tokens)
                .with_batch_size(config.embedding.batch_size),
        )
    }

    /// Set retrieval limits.
    pub fn with_retrieval(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    /// Set the temperature and answer length sent with every request.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the embedding batch size used by [`AnswerPipeline::store_document`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn retriever(&self) -> &PassageRetriever {
        &self.retriever
    }

    /// Prepare the vector collection. Call once before serving.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.retriever.ensure_collection().await?;
        Ok(())
    }

    /// Embed and store the passages of one document.
    pub async fn store_document(
        &self,
        document_id: &str,
        owner_user_id: &str,
        passages: Vec<DocumentPassage>,
    ) -> Result<usize> {
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = self.embedder.embed_batched(&texts, self.batch_size).await?;

        let inputs = passages
            .into_iter()
            .zip(vectors)
            .map(|(p, vector)| PassageInput {
                content: p.content,
                vector,
                page_number: p.page_number,
                chunk_index: p.chunk_index,
                token_count: p.token_count,
            })
            .collect();

        let stored = self
            .retriever
            .store(document_id, owner_user_id, inputs)
            .await?;
        Ok(stored)
    }

    /// Answer `query` from the user's documents.
    ///
    /// When `sink` is given, answer fragments are sent to it as they are
    /// produced. A closed sink is not an error; the answer is still
    /// assembled and returned. Any capability failure aborts the run.
    pub async fn ask(
        &self,
        query: &Query,
        sink: Option<mpsc::Sender<String>>,
    ) -> Result<PipelineResult> {
        let started = Instant::now();
        info!(
            "Answering question for user {} ({} documents in scope)",
            query.user_id,
            query.document_ids.len()
        );

        let query_vector = self.embedder.embed_query(&query.question).await?;
        let passages = self
            .retriever
            .retrieve(
                &query_vector,
                &query.user_id,
                &query.document_ids,
                self.retrieval.top_k,
                self.retrieval.score_threshold,
            )
            .await?;

        if passages.is_empty() {
            warn!("No passages above threshold; skipping generation");
            return Ok(PipelineResult {
                answer_text: NO_MATCH_ANSWER.to_string(),
                citations: Vec::new(),
                model_used: NO_MODEL.to_string(),
                token_count: 0,
                latency_ms: elapsed_ms(started),
            });
        }

        let (answer_text, model_used, token_count) =
            self.generate(&query.question, &passages, sink).await?;

        let numbers = extract_citation_numbers(&answer_text);
        let citations = map_citations(&numbers, &passages);
        let latency_ms = elapsed_ms(started);
        info!(
            "Answered with {model_used}: {} citations, {token_count} tokens, {latency_ms}ms",
            citations.len()
        );

        Ok(PipelineResult {
            answer_text,
            citations,
            model_used,
            token_count,
            latency_ms,
        })
    }

    async fn generate(
        &self,
        question: &str,
        passages: &[RetrievedPassage],
        mut sink: Option<mpsc::Sender<String>>,
    ) -> Result<(String, String, u64)> {
        let prompt_passages: Vec<PromptPassage<'_>> =
            passages.iter().map(PromptPassage::from).collect();
        let prompt = build_prompt(question, &prompt_passages);

        let tier = classify(question);
        let model_used = self.generator.model_for(tier).to_string();
        debug!("Question classified as {tier:?}; using {model_used}");

        let request = GenerationRequest::new(prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let mut stream = self.generator.generate_stream(&request, tier).await?;

        let mut answer = String::new();
        let mut token_count = 0;
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Fragment(fragment) => {
                    answer.push_str(&fragment);
                    let delivered = match &sink {
                        Some(tx) => tx.send(fragment).await.is_ok(),
                        None => true,
                    };
                    if !delivered {
                        debug!("Answer sink closed; continuing without it");
                        sink = None;
                    }
                }
                StreamEvent::Usage { total_tokens } => token_count = total_tokens,
            }
        }

        Ok((answer, model_used, token_count))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use pretty_assertions::assert_eq;

    fn config_with(model: &str, dimension: usize) -> PipelineConfig {
        PipelineConfig {
            embedding: EmbeddingConfig {
                model: model.to_string(),
                dimension,
                ..EmbeddingConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_from_config_defaults() {
        let pipeline = AnswerPipeline::from_config(&PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.retriever().dimension(), 1536);
        assert_eq!(pipeline.batch_size, 100);
    }

    #[test]
    fn test_from_config_rejects_dimension_mismatch() {
        let err = AnswerPipeline::from_config(&config_with("text-embedding-3-large", 1536))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("3072")));
    }

    #[test]
    fn test_from_config_accepts_matching_dimension() {
        let pipeline =
            AnswerPipeline::from_config(&config_with("text-embedding-3-large", 3072)).unwrap();
        assert_eq!(pipeline.retriever().dimension(), 3072);
    }
}
