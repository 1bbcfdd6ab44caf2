//! # Retrieval
//!
//! Owner-scoped passage retrieval over an external vector index.
//!
//! ```text
//! query vector ──► PassageRetriever ──► VectorIndex::search ──► [RetrievedPassage]
//!                        │                    │
//!                        ▼                    ▼
//!                 PassageFilter        QdrantIndex / InMemoryIndex
//! ```
//!
//! The retriever also owns the collection lifecycle (`ensure_collection`)
//! and the write side used by ingestion (`store`, `delete_by_document`).

pub mod error;
pub mod filter;
pub mod index;
pub mod memory;
pub mod passage;
pub mod qdrant;
pub mod retriever;

pub use error::{Result, RetrievalError};
pub use filter::{FieldCondition, PassageFilter, PayloadField};
pub use index::{CollectionStatus, ScoredPoint, SearchRequest, VectorIndex};
pub use memory::InMemoryIndex;
pub use passage::{PassageInput, PassagePayload, RetrievedPassage, StoredPassage, passage_id};
pub use qdrant::{DEFAULT_COLLECTION, DEFAULT_QDRANT_URL, QdrantIndex};
pub use retriever::PassageRetriever;
