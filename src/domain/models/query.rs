use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Metadata, MetadataValue};
use crate::domain::StoreError;

/// Metadata predicate. Equality, containment and conjunction are the
/// operators every backend understands.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Eq { field: String, value: MetadataValue },
    In { field: String, values: Vec<MetadataValue> },
    And(Vec<QueryFilter>),
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<MetadataValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        Self::And(filters)
    }

    /// Render as a Mongo-style `where` clause (`$eq`, `$in`, `$and`), the
    /// syntax shared by Chroma and Pinecone.
    ///
    /// Returns `None` for a filter that constrains nothing (an empty `And`).
    /// Single-element conjunctions are flattened since Chroma rejects `$and`
    /// with fewer than two operands.
    pub fn to_where_clause(&self) -> Option<Value> {
        match self {
            Self::Eq { field, value } => {
                Some(json!({ field.as_str(): { "$eq": value.to_json() } }))
            }
            Self::In { field, values } => {
                let values: Vec<Value> = values.iter().map(MetadataValue::to_json).collect();
                Some(json!({ field.as_str(): { "$in": values } }))
            }
            Self::And(filters) => {
                let mut clauses: Vec<Value> =
                    filters.iter().filter_map(QueryFilter::to_where_clause).collect();
                match clauses.len() {
                    0 => None,
                    1 => clauses.pop(),
                    _ => Some(json!({ "$and": clauses })),
                }
            }
        }
    }

    /// Reject filters that backends disagree on. Chroma servers refuse an
    /// empty `$in`, so an `In` without values is a caller error everywhere.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Self::Eq { .. } => Ok(()),
            Self::In { field, values } if values.is_empty() => Err(StoreError::validation(
                format!("filter on '{}' needs at least one value", field),
            )),
            Self::In { .. } => Ok(()),
            Self::And(filters) => filters.iter().try_for_each(QueryFilter::validate),
        }
    }

    /// Evaluate the filter against a metadata map.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field) == Some(value),
            Self::In { field, values } => metadata
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// A normalized search hit. `score` is always higher-is-better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub document: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl QueryResult {
    pub fn new(id: impl Into<String>, document: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
            score,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

pub fn validate_top_k(top_k: usize) -> Result<(), StoreError> {
    if top_k == 0 {
        return Err(StoreError::validation("top_k must be at least 1"));
    }
    Ok(())
}

/// Stable sort by descending score, then cap at `top_k`.
pub fn rank_results(mut results: Vec<QueryResult>, top_k: usize) -> Vec<QueryResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);
    results
}
