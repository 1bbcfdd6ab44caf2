//! Grounded QA prompt.
//!
//! Passages are numbered `[1]`, `[2]`, ... in the order given. The citation
//! parser in [`crate::citation`] reads the same `[n]` syntax back out of the
//! answer, so the template and the parser are versioned together: a change
//! to the marker syntax here needs a matching change there.

use docqa_retrieval::RetrievedPassage;

/// Version of [`QA_TEMPLATE`] and its citation syntax.
pub const QA_PROMPT_VERSION: &str = "v1.0.0";

/// Separator between numbered passages in the context block.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Instructions wrapped around the context and question.
pub const QA_TEMPLATE: &str = "You are an intelligent document assistant. Your role is to answer questions based ONLY on the provided context from documents.

CRITICAL RULES:
1. Answer ONLY using information from the context below
2. If the answer is not in the context, say \"I cannot find that information in the provided documents\"
3. Include citation numbers [1], [2], etc. after statements that come from specific sources
4. Be concise but complete
5. If the context is contradictory, acknowledge different perspectives
6. Never make up or infer information not present in the context

Context:
{context}

Question: {question}

Answer with citations:";

/// A registered prompt revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptVersion {
    pub key: &'static str,
    pub version: &'static str,
    pub created_at: &'static str,
    pub description: &'static str,
}

/// Every prompt revision shipped so far.
pub const PROMPT_VERSIONS: &[PromptVersion] = &[PromptVersion {
    key: "qa_v1",
    version: "1.0.0",
    created_at: "2025-01-10",
    description: "Initial Q&A prompt with citation support",
}];

/// Version string for a prompt key, or `"unknown"`.
pub fn prompt_version(key: &str) -> &'static str {
    PROMPT_VERSIONS
        .iter()
        .find(|v| v.key == key)
        .map_or("unknown", |v| v.version)
}

/// The parts of a passage that go into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPassage<'a> {
    pub id: &'a str,
    pub content: &'a str,
}

impl<'a> From<&'a RetrievedPassage> for PromptPassage<'a> {
    fn from(passage: &'a RetrievedPassage) -> Self {
        Self {
            id: &passage.id,
            content: &passage.content,
        }
    }
}

/// Render the numbered context block.
pub fn format_context(passages: &[PromptPassage<'_>]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(idx, p)| format!("[{}] {}", idx + 1, p.content))
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

/// Build the full prompt for `question` over `passages`.
///
/// Passage `i` (0-based) is labelled `[i + 1]`; callers must pass passages
/// in retrieval order and later resolve citations against the same slice.
pub fn build_prompt(question: &str, passages: &[PromptPassage<'_>]) -> String {
    let context = format_context(passages);
    render(QA_TEMPLATE, &context, question)
}

/// Fill both slots in one pass so text inside the context or question is
/// never treated as a slot.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let Some((before_context, rest)) = template.split_once(CONTEXT_SLOT) else {
        return template.to_string();
    };
    out.push_str(before_context);
    out.push_str(context);

    match rest.split_once(QUESTION_SLOT) {
        Some((between, after)) => {
            out.push_str(between);
            out.push_str(question);
            out.push_str(after);
        }
        None => out.push_str(rest),
    }
    out
}
