//! Question complexity tiers.

use serde::{Deserialize, Serialize};

/// Coarse complexity of a question, used to pick a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Complex,
}

/// Phrases that signal analytical or comparative intent.
const COMPLEX_INDICATORS: &[&str] = &[
    "compare",
    "analyze",
    "evaluate",
    "synthesize",
    "explain how",
    "explain why",
    "relationship",
    "multiple",
    "differences",
    "similarities",
];

/// Questions longer than this many characters are always complex.
pub const LONG_QUESTION_CHARS: usize = 100;

/// Classify a question.
///
/// A wrong answer only shifts the cost/quality trade-off; it never changes
/// what the pipeline is allowed to say.
pub fn classify(question: &str) -> Complexity {
    let lower = question.to_lowercase();
    let has_indicator = COMPLEX_INDICATORS.iter().any(|kw| lower.contains(kw));
    let is_long = question.chars().count() > LONG_QUESTION_CHARS;

    if has_indicator || is_long {
        Complexity::Complex
    } else {
        Complexity::Simple
    }
}
