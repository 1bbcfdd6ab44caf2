//! Passage records exchanged with the vector index.

use docqa_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload stored alongside every vector.
///
/// Field names are the wire names used by ingestion, so existing
/// collections stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassagePayload {
    /// Document the passage was cut from.
    pub document_id: String,

    /// User who owns the document.
    #[serde(rename = "userId")]
    pub owner_user_id: String,

    /// Passage text.
    pub content: String,

    /// Page the passage starts on, when the source has pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    /// Position of the passage within its document.
    pub chunk_index: u32,

    /// Token count reported by ingestion.
    #[serde(default)]
    pub token_count: u32,
}

/// A passage as written to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPassage {
    /// Point id, see [`passage_id`].
    #[serde(rename = "id")]
    pub passage_id: String,

    /// Passage embedding.
    pub vector: Embedding,

    /// Passage metadata.
    pub payload: PassagePayload,
}

/// A passage handed to [`crate::PassageRetriever::store`] by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct PassageInput {
    pub content: String,
    pub vector: Embedding,
    pub page_number: Option<u32>,
    pub chunk_index: u32,
    pub token_count: u32,
}

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedPassage {
    pub id: String,
    pub content: String,
    pub document_id: String,
    pub page_number: Option<u32>,
    pub chunk_index: u32,
    pub similarity_score: f32,
}

/// Stable point id for a passage.
///
/// Derived from `(document_id, chunk_index)` so that re-ingesting the same
/// chunk overwrites the existing point.
pub fn passage_id(document_id: &str, chunk_index: u32) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{document_id}_{chunk_index}").as_bytes(),
    )
    .to_string()
}
