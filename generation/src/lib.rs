//! # Generation
//!
//! Produces answers to prompts, either in one response or as a stream of
//! text fragments, at a model tier chosen from the question's complexity.
//!
//! ```text
//! question ──► classify ──► Complexity ──► ModelTiers::model_for
//!                                                │
//! prompt ──────────────────────► AnswerGenerator::generate_stream ──► AnswerStream
//! ```

pub mod complexity;
pub mod error;
pub mod generator;
pub mod openai;

pub use complexity::{Complexity, LONG_QUESTION_CHARS, classify};
pub use error::{GenerationError, Result};
pub use generator::{
    AnswerGenerator, AnswerStream, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, Generation,
    GenerationRequest, ModelTiers, StreamEvent,
};
pub use openai::OpenAIChat;
