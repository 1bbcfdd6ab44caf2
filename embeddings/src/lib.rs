//! # Embeddings
//!
//! Converts text into fixed-dimension vectors for passage retrieval.
//!
//! ## Features
//!
//! - **Embedding Generation**: one vector per input text, in input order
//! - **Batching**: large inputs are split into sequential provider calls
//! - **Similarity**: cosine scoring and top-k ranking helpers
//!
//! ```text
//! texts ──► EmbeddingProvider::embed_batched ──► [Embedding; n]
//!                      │
//!                      ▼
//!               OpenAIProvider (POST /embeddings)
//! ```

pub mod error;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use provider::{BatchProgress, EmbeddingProvider, OpenAIProvider};
pub use similarity::{SimilarityResult, cosine_similarity, find_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings shared with the vector index schema.
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small

/// Default number of texts sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 100;
