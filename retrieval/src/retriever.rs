//! Owner-scoped passage retrieval and collection lifecycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, RetrievalError};
use crate::filter::{PassageFilter, PayloadField};
use crate::index::{CollectionStatus, SearchRequest, VectorIndex};
use crate::passage::{PassageInput, PassagePayload, RetrievedPassage, StoredPassage, passage_id};

/// Retrieves, stores and deletes passages in a [`VectorIndex`].
#[derive(Clone)]
pub struct PassageRetriever {
    index: Arc<dyn VectorIndex>,
    dimension: usize,
}

impl PassageRetriever {
    /// Create a retriever over `index` for vectors of `dimension` floats.
    pub fn new(index: Arc<dyn VectorIndex>, dimension: usize) -> Self {
        Self { index, dimension }
    }

    /// Expected vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the collection and its payload indexes if it does not exist.
    ///
    /// Only a definite "not found" leads to creation. Any other probe
    /// failure is reported as [`RetrievalError::SetupFailed`] so that a
    /// transient outage is not mistaken for a missing collection. Not safe
    /// against two processes racing to create; call once at start-up.
    pub async fn ensure_collection(&self) -> Result<()> {
        let collection = self.index.collection().to_string();

        match self.index.collection_status().await {
            Ok(CollectionStatus::Exists) => {
                info!("Collection {collection} already exists");
                return Ok(());
            }
            Ok(CollectionStatus::Missing) => {}
            Err(err) => {
                warn!("Probing collection {collection} failed: {err}");
                return Err(RetrievalError::SetupFailed(err.to_string()));
            }
        }

        info!("Creating collection {collection}");
        self.index.create_collection(self.dimension).await?;
        self.index
            .create_keyword_index(PayloadField::DocumentId)
            .await?;
        self.index
            .create_keyword_index(PayloadField::OwnerUserId)
            .await?;
        info!("Collection {collection} created");

        Ok(())
    }

    /// Find the passages most similar to `query_vector` that belong to
    /// `owner_user_id`, optionally restricted to `document_ids`.
    ///
    /// Results keep the index's ranking (descending similarity); they are
    /// never re-sorted here, only held to `top_k` and `score_threshold`.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        owner_user_id: &str,
        document_ids: &[String],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedPassage>> {
        if query_vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        debug!(
            "Retrieving passages: top_k={top_k}, threshold={score_threshold}, documents={}",
            document_ids.len()
        );

        let request = SearchRequest {
            vector: query_vector.to_vec(),
            limit: top_k,
            filter: PassageFilter::for_owner(owner_user_id)
                .with_documents(document_ids.iter().cloned()),
            score_threshold,
        };

        let passages: Vec<RetrievedPassage> = self
            .index
            .search(&request)
            .await?
            .into_iter()
            .filter(|hit| hit.score >= score_threshold)
            .take(top_k)
            .map(|hit| RetrievedPassage {
                id: hit.id,
                content: hit.payload.content,
                document_id: hit.payload.document_id,
                page_number: hit.payload.page_number,
                chunk_index: hit.payload.chunk_index,
                similarity_score: hit.score,
            })
            .collect();

        info!("Retrieved {} passages", passages.len());
        Ok(passages)
    }

    /// Upsert the passages of one document, returning how many were written.
    ///
    /// Point ids derive from `(document_id, chunk_index)`, so storing the
    /// same chunk again overwrites it.
    pub async fn store(
        &self,
        document_id: &str,
        owner_user_id: &str,
        passages: Vec<PassageInput>,
    ) -> Result<usize> {
        if let Some(bad) = passages.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        let points: Vec<StoredPassage> = passages
            .into_iter()
            .map(|p| StoredPassage {
                passage_id: passage_id(document_id, p.chunk_index),
                vector: p.vector,
                payload: PassagePayload {
                    document_id: document_id.to_string(),
                    owner_user_id: owner_user_id.to_string(),
                    content: p.content,
                    page_number: p.page_number,
                    chunk_index: p.chunk_index,
                    token_count: p.token_count,
                },
            })
            .collect();

        let count = points.len();
        self.index.upsert(points).await?;

        info!("Stored {count} passages for document {document_id}");
        Ok(count)
    }

    /// Remove every passage of a document.
    pub async fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.index
            .delete(&PassageFilter::for_document(document_id))
            .await?;
        info!("Deleted passages for document {document_id}");
        Ok(())
    }
}
