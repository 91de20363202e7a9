use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::StoreError;

/// Records in Chroma's column layout: parallel `ids`/`documents`/`metadatas`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChromaRecords {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Option<Map<String, Value>>>,
}

impl ChromaRecords {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChromaQuery {
    pub query_texts: Vec<String>,
    pub n_results: usize,
    /// Chroma `where` clause over metadata.
    pub where_clause: Option<Value>,
}

/// Chroma's query response: one inner list per query text, ordered by
/// ascending distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChromaQueryResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

/// A Chroma collection that tokenizes, embeds and indexes text itself.
#[async_trait]
pub trait ChromaEngine: Send + Sync {
    async fn upsert(&self, records: ChromaRecords) -> Result<(), StoreError>;

    async fn query(&self, query: ChromaQuery) -> Result<ChromaQueryResponse, StoreError>;

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Engine-specific values reported by `describe()`.
    fn stats(&self) -> BTreeMap<String, Value>;
}
