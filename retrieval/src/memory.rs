//! In-process vector index.
//!
//! Mirrors the behaviour the retriever relies on from a real index: keyed
//! upserts, payload filters, a score floor and descending cosine ranking.
//! Useful for tests and offline runs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use docqa_embeddings::find_top_k;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::filter::{PassageFilter, PayloadField};
use crate::index::{CollectionStatus, ScoredPoint, SearchRequest, VectorIndex};
use crate::passage::StoredPassage;

#[derive(Default)]
struct Collection {
    dimension: usize,
    points: BTreeMap<String, StoredPassage>,
    keyword_indexes: HashSet<PayloadField>,
}

/// A [`VectorIndex`] held entirely in memory.
pub struct InMemoryIndex {
    name: String,
    collection: RwLock<Option<Collection>>,
}

impl InMemoryIndex {
    /// Create an index whose collection does not exist yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(None),
        }
    }

    /// Number of stored points.
    pub async fn len(&self) -> usize {
        self.collection
            .read()
            .await
            .as_ref()
            .map_or(0, |c| c.points.len())
    }

    /// Whether the collection holds no points.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a keyword index exists on `field`.
    pub async fn has_keyword_index(&self, field: PayloadField) -> bool {
        self.collection
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.keyword_indexes.contains(&field))
    }

    fn missing(&self) -> RetrievalError {
        RetrievalError::CollectionMissing(self.name.clone())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn collection_status(&self) -> Result<CollectionStatus> {
        Ok(match *self.collection.read().await {
            Some(_) => CollectionStatus::Exists,
            None => CollectionStatus::Missing,
        })
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        let mut collection = self.collection.write().await;
        if collection.is_some() {
            return Err(RetrievalError::Api {
                status: 409,
                body: format!("collection {} already exists", self.name),
            });
        }
        *collection = Some(Collection {
            dimension,
            ..Default::default()
        });
        Ok(())
    }

    async fn create_keyword_index(&self, field: PayloadField) -> Result<()> {
        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| self.missing())?;
        collection.keyword_indexes.insert(field);
        Ok(())
    }

    async fn upsert(&self, points: Vec<StoredPassage>) -> Result<()> {
        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| self.missing())?;

        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() != collection.dimension)
        {
            return Err(RetrievalError::DimensionMismatch {
                expected: collection.dimension,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            collection.points.insert(point.passage_id.clone(), point);
        }
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;

        let candidates = collection
            .points
            .values()
            .filter(|p| request.filter.matches(&p.payload))
            .map(|p| (p.passage_id.as_str(), p.vector.as_slice()));

        let ranked = find_top_k(
            &request.vector,
            candidates,
            request.limit,
            request.score_threshold,
        )?;

        debug!("In-memory search matched {} points", ranked.len());

        Ok(ranked
            .into_iter()
            .filter_map(|hit| {
                let payload = collection.points.get(&hit.id)?.payload.clone();
                Some(ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload,
                })
            })
            .collect())
    }

    async fn delete(&self, filter: &PassageFilter) -> Result<()> {
        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| self.missing())?;
        collection.points.retain(|_, p| !filter.matches(&p.payload));
        Ok(())
    }
}
