use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::StoreError;

/// A resolved index: the data-plane host plus what the control plane knows.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHandle {
    pub name: String,
    pub host: String,
    pub dimension: Option<u32>,
}

/// Parameters for creating an index bound to a hosted embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub cloud: String,
    pub region: String,
    pub model: String,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            model: "llama-text-embed-v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub include_metadata: bool,
}

/// A match as reported by the index. `score` is already higher-is-better.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredVector {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexStats {
    pub dimension: Option<u32>,
    pub index_fullness: f64,
    pub total_vector_count: u64,
}

/// Control and data plane of a managed vector index that stores raw vectors
/// only.
#[async_trait]
pub trait IndexService: Send + Sync {
    /// `Ok(None)` when the index does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexHandle>, StoreError>;

    async fn create_index(&self, name: &str, spec: &IndexSpec) -> Result<IndexHandle, StoreError>;

    async fn upsert(&self, index: &IndexHandle, vectors: &[VectorRecord]) -> Result<(), StoreError>;

    async fn query(
        &self,
        index: &IndexHandle,
        query: &VectorQuery,
    ) -> Result<Vec<ScoredVector>, StoreError>;

    async fn delete(&self, index: &IndexHandle, ids: &[String]) -> Result<(), StoreError>;

    async fn describe_index_stats(&self, index: &IndexHandle) -> Result<IndexStats, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vector_query_wire_shape() {
        let query = VectorQuery {
            vector: vec![0.1, 0.2],
            top_k: 5,
            filter: None,
            include_metadata: true,
        };

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"vector": [0.1f32, 0.2f32], "topK": 5, "includeMetadata": true})
        );
    }

    #[test]
    fn test_index_stats_parse() {
        let stats: IndexStats = serde_json::from_value(json!({
            "namespaces": {"": {"vectorCount": 3}},
            "dimension": 1024,
            "indexFullness": 0.0,
            "totalVectorCount": 3
        }))
        .unwrap();

        assert_eq!(stats.dimension, Some(1024));
        assert_eq!(stats.total_vector_count, 3);
    }
}
