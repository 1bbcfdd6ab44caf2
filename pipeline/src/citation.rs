//! Citation markers in generated answers.

use std::sync::LazyLock;

use docqa_retrieval::RetrievedPassage;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Longest snippet kept from a cited passage, in characters.
pub const SNIPPET_CHARS: usize = 200;

/// `[` one or more ASCII digits `]`; nothing else counts as a marker.
static CITATION_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([0-9]+)\]").ok());

/// A reference from the answer back to a source passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub passage_id: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub snippet: String,
    pub similarity_score: f32,
}

/// Every citation number in `answer`, in order of appearance.
///
/// Duplicates are kept. Numbers too large to represent are skipped.
pub fn extract_citation_numbers(answer: &str) -> Vec<usize> {
    let Some(re) = CITATION_MARKER.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(answer)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .collect()
}

/// Resolve citation numbers against the passages the prompt was built from.
///
/// `[n]` refers to `passages[n - 1]`. Numbers outside `1..=passages.len()`
/// are dropped; every other number yields a citation, in the order given,
/// so a passage cited twice appears twice.
pub fn map_citations(numbers: &[usize], passages: &[RetrievedPassage]) -> Vec<Citation> {
    numbers
        .iter()
        .filter_map(|n| n.checked_sub(1))
        .filter_map(|idx| passages.get(idx))
        .map(|passage| Citation {
            passage_id: passage.id.clone(),
            document_id: passage.document_id.clone(),
            page_number: passage.page_number,
            snippet: snippet(&passage.content),
            similarity_score: passage.similarity_score,
        })
        .collect()
}

/// First [`SNIPPET_CHARS`] characters of `content`, with `...` appended when
/// anything was cut.
pub fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
