//! Error types for passage retrieval.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while talking to the vector index.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The vector index answered with a non-success status.
    #[error("vector index request failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// The vector index answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A vector does not have the collection's dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The collection has not been created.
    #[error("collection not found: {0}")]
    CollectionMissing(String),

    /// Collection setup could not decide whether the collection exists.
    #[error("collection setup failed: {0}")]
    SetupFailed(String),

    /// Embedding helper error.
    #[error("embedding error: {0}")]
    Embedding(#[from] docqa_embeddings::EmbeddingError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
