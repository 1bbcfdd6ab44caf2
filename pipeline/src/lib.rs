//! # Pipeline
//!
//! Answers a user's question from their own documents, with citations that
//! point back to the passages the answer was built from.
//!
//! ```text
//! Query ──► embed_query ──► retrieve ──┬─ no passages ──► NO_MATCH_ANSWER
//!                                      │
//!                                      └─► build_prompt ──► classify ──► generate_stream
//!                                                                             │
//!                                    sink ◄── fragments ◄─────────────────────┤
//!                                                                             ▼
//!                                  PipelineResult ◄── map_citations ◄── extract_citation_numbers
//! ```

pub mod citation;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;

pub use citation::{Citation, SNIPPET_CHARS, extract_citation_numbers, map_citations, snippet};
pub use config::{
    EmbeddingConfig, GenerationConfig, PipelineConfig, RetrievalConfig, VectorStoreConfig,
};
pub use error::{PipelineError, Result};
pub use pipeline::{
    AnswerPipeline, DocumentPassage, NO_MATCH_ANSWER, NO_MODEL, PipelineResult, Query,
};
pub use prompt::{
    PASSAGE_SEPARATOR, PROMPT_VERSIONS, PromptPassage, PromptVersion, QA_PROMPT_VERSION,
    QA_TEMPLATE, build_prompt, format_context, prompt_version,
};
