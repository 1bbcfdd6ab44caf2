//! Qdrant REST client.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, RetrievalError};
use crate::filter::{PassageFilter, PayloadField};
use crate::index::{CollectionStatus, ScoredPoint, SearchRequest, VectorIndex};
use crate::passage::{PassagePayload, StoredPassage};

/// Default Qdrant endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "documents";

/// [`VectorIndex`] backed by a Qdrant collection over HTTP.
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    /// Create a client for `collection` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: None,
        }
    }

    /// Send an `api-key` header with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/collections/{}{path}", self.base_url, self.collection);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RetrievalError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn collection_status(&self) -> Result<CollectionStatus> {
        let response = self.request(Method::GET, "").send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CollectionStatus::Missing);
        }
        Self::check(response).await?;
        Ok(CollectionStatus::Exists)
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        let body = serde_json::json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine"
            },
            "optimizers_config": {
                "default_segment_number": 2
            },
            "replication_factor": 1
        });

        let response = self.request(Method::PUT, "").json(&body).send().await?;
        Self::check(response).await?;

        info!(
            "Created collection {} ({dimension} dimensions)",
            self.collection
        );
        Ok(())
    }

    async fn create_keyword_index(&self, field: PayloadField) -> Result<()> {
        let body = serde_json::json!({
            "field_name": field.as_str(),
            "field_schema": "keyword"
        });

        let response = self
            .request(Method::PUT, "/index")
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        debug!("Created keyword index on {}", field.as_str());
        Ok(())
    }

    async fn upsert(&self, points: Vec<StoredPassage>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let body = serde_json::json!({ "points": points });

        let response = self
            .request(Method::PUT, "/points")
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        debug!("Upserted {count} points into {}", self.collection);
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        let body = serde_json::json!({
            "vector": request.vector,
            "limit": request.limit,
            "filter": request.filter,
            "with_payload": true,
            "score_threshold": request.score_threshold
        });

        let response = self
            .request(Method::POST, "/points/search")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let parsed: SearchResponse = response.json().await?;

        parsed
            .result
            .into_iter()
            .map(|entry| {
                let id = entry.id.to_string();
                let payload = entry.payload.ok_or_else(|| {
                    RetrievalError::InvalidResponse(format!("point {id} has no payload"))
                })?;
                Ok(ScoredPoint {
                    id,
                    score: entry.score,
                    payload,
                })
            })
            .collect()
    }

    async fn delete(&self, filter: &PassageFilter) -> Result<()> {
        let body = serde_json::json!({ "filter": filter });

        let response = self
            .request(Method::POST, "/points/delete")
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: PointId,
    score: f32,
    payload: Option<PassagePayload>,
}

/// Qdrant point ids are either UUID strings or unsigned integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Uuid(String),
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}
