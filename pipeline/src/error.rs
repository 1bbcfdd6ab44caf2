//! Error types for the answer pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a pipeline run.
///
/// Capability errors are carried unchanged; there is no partial result.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] docqa_embeddings::EmbeddingError),

    /// Retrieval error.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] docqa_retrieval::RetrievalError),

    /// Generation error.
    #[error("generation error: {0}")]
    Generation(#[from] docqa_generation::GenerationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
