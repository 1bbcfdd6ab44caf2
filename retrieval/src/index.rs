//! The vector index capability.

use async_trait::async_trait;
use docqa_embeddings::Embedding;
use serde::Serialize;

use crate::error::Result;
use crate::filter::{PassageFilter, PayloadField};
use crate::passage::{PassagePayload, StoredPassage};

/// Outcome of probing for the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Exists,
    Missing,
}

/// A similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub vector: Embedding,
    pub limit: usize,
    pub filter: PassageFilter,
    pub score_threshold: f32,
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PassagePayload,
}

/// A vector index holding passage embeddings in a single collection.
///
/// Implementations must be safe to share between concurrent requests.
/// `search` returns hits ranked by descending similarity.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index operates on.
    fn collection(&self) -> &str;

    /// Probe for the collection.
    async fn collection_status(&self) -> Result<CollectionStatus>;

    /// Create the collection with cosine distance.
    async fn create_collection(&self, dimension: usize) -> Result<()>;

    /// Create a keyword index on a payload field.
    async fn create_keyword_index(&self, field: PayloadField) -> Result<()>;

    /// Insert or overwrite points by id.
    async fn upsert(&self, points: Vec<StoredPassage>) -> Result<()>;

    /// Run a filtered similarity search.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredPoint>>;

    /// Delete every point matching `filter`.
    async fn delete(&self, filter: &PassageFilter) -> Result<()>;
}
