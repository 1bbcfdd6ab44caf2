//! Typed payload filters for similarity search and bulk delete.
//!
//! A [`PassageFilter`] is a conjunction of [`FieldCondition`]s. Search
//! filters always start from [`PassageFilter::for_owner`], so a query can
//! never run without the ownership clause.

use serde::Serialize;
use serde::ser::Serializer;

use crate::passage::PassagePayload;

/// Payload fields that filters may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadField {
    DocumentId,
    OwnerUserId,
}

impl PayloadField {
    /// Wire name of the field inside the stored payload.
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadField::DocumentId => "documentId",
            PayloadField::OwnerUserId => "userId",
        }
    }

    fn value_of(self, payload: &PassagePayload) -> &str {
        match self {
            PayloadField::DocumentId => &payload.document_id,
            PayloadField::OwnerUserId => &payload.owner_user_id,
        }
    }
}

/// A single clause of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// The field equals `value`.
    Equals { field: PayloadField, value: String },

    /// The field equals one of `values`.
    AnyOf {
        field: PayloadField,
        values: Vec<String>,
    },
}

impl FieldCondition {
    /// Evaluate the clause against a payload.
    pub fn matches(&self, payload: &PassagePayload) -> bool {
        match self {
            FieldCondition::Equals { field, value } => field.value_of(payload) == value,
            FieldCondition::AnyOf { field, values } => {
                let actual = field.value_of(payload);
                values.iter().any(|v| v == actual)
            }
        }
    }
}

#[derive(Serialize)]
struct ConditionRepr<'a> {
    key: &'static str,
    #[serde(rename = "match")]
    matcher: MatchRepr<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MatchRepr<'a> {
    Value { value: &'a str },
    Any { any: &'a [String] },
}

impl Serialize for FieldCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            FieldCondition::Equals { field, value } => ConditionRepr {
                key: field.as_str(),
                matcher: MatchRepr::Value { value },
            },
            FieldCondition::AnyOf { field, values } => ConditionRepr {
                key: field.as_str(),
                matcher: MatchRepr::Any { any: values },
            },
        };
        repr.serialize(serializer)
    }
}

/// Conjunction of payload conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageFilter {
    must: Vec<FieldCondition>,
}

impl PassageFilter {
    /// Filter requiring an exact owner match.
    pub fn for_owner(owner_user_id: impl Into<String>) -> Self {
        Self {
            must: vec![FieldCondition::Equals {
                field: PayloadField::OwnerUserId,
                value: owner_user_id.into(),
            }],
        }
    }

    /// Filter selecting every passage of one document, regardless of owner.
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            must: vec![FieldCondition::Equals {
                field: PayloadField::DocumentId,
                value: document_id.into(),
            }],
        }
    }

    /// Restrict to the given documents. An empty set leaves the filter as is.
    pub fn with_documents<I, S>(mut self, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = document_ids.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.must.push(FieldCondition::AnyOf {
                field: PayloadField::DocumentId,
                values,
            });
        }
        self
    }

    /// The clauses of this filter.
    pub fn conditions(&self) -> &[FieldCondition] {
        &self.must
    }

    /// Whether a payload satisfies every clause.
    pub fn matches(&self, payload: &PassagePayload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
    }
}
