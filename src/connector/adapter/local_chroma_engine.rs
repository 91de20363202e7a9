use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    cosine_similarity, embed_in_order, ChromaEngine, ChromaQuery, ChromaQueryResponse,
    ChromaRecords,
};
use crate::application::{EmbeddingMode, EmbeddingProvider};
use crate::domain::StoreError;

const BACKEND: &str = "chromadb";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    document: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    model: String,
    records: BTreeMap<String, StoredRecord>,
}

/// In-process Chroma collection using cosine distance (`1 - cos`).
///
/// With a persist directory, the collection is loaded from
/// `<dir>/<collection>.json` on open and rewritten after every mutation.
pub struct LocalChromaEngine {
    collection_name: String,
    persist_path: Option<PathBuf>,
    embedder: Arc<dyn EmbeddingProvider>,
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl LocalChromaEngine {
    pub fn in_memory(collection_name: &str, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            collection_name: collection_name.to_string(),
            persist_path: None,
            embedder,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open (or create) the collection, persisting under `persist_directory`
    /// when given.
    pub async fn open(
        persist_directory: Option<&Path>,
        collection_name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, StoreError> {
        validate_collection_name(collection_name)?;

        let Some(dir) = persist_directory else {
            debug!("Using in-memory ChromaDB collection: {}", collection_name);
            return Ok(Self::in_memory(collection_name, embedder));
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        let path = dir.join(format!("{}.json", collection_name));

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::backend(
                        BACKEND,
                        format!("corrupt collection file {}: {}", path.display(), e),
                    )
                })?;
                if snapshot.model != embedder.model_name() {
                    return Err(StoreError::config(format!(
                        "Collection '{}' in {} was embedded with '{}' but '{}' is configured",
                        collection_name,
                        path.display(),
                        snapshot.model,
                        embedder.model_name()
                    )));
                }
                info!(
                    "Loaded {} records for collection {} from {}",
                    snapshot.records.len(),
                    collection_name,
                    path.display()
                );
                snapshot.records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::backend(BACKEND, e)),
        };

        Ok(Self {
            collection_name: collection_name.to_string(),
            persist_path: Some(path),
            embedder,
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let snapshot = SnapshotRef {
            collection: &self.collection_name,
            model: self.embedder.model_name(),
            records,
        };
        let bytes = serde_json::to_vec(&snapshot).map_err(|e| StoreError::backend(BACKEND, e))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        debug!("Persisted {} records to {}", records.len(), path.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    collection: &'a str,
    model: &'a str,
    records: &'a BTreeMap<String, StoredRecord>,
}

#[async_trait]
impl ChromaEngine for LocalChromaEngine {
    async fn upsert(&self, records: ChromaRecords) -> Result<(), StoreError> {
        if records.documents.len() != records.len() || records.metadatas.len() != records.len() {
            return Err(StoreError::backend(
                BACKEND,
                "ids, documents and metadatas must have the same length",
            ));
        }

        let embeddings = embed_in_order(
            self.embedder.as_ref(),
            &records.documents,
            EmbeddingMode::Passage,
            1,
            BACKEND,
        )
        .await?;

        // Applied to a copy so a failed snapshot leaves the collection as it was.
        let mut store = self.records.write().await;
        let mut next = store.clone();
        let count = records.len();
        for ((id, document), (metadata, embedding)) in records
            .ids
            .into_iter()
            .zip(records.documents)
            .zip(records.metadatas.into_iter().zip(embeddings))
        {
            next.insert(
                id,
                StoredRecord {
                    document,
                    embedding,
                    metadata,
                },
            );
        }
        self.persist(&next).await?;
        *store = next;

        debug!(
            "Upserted {} records into local collection {}",
            count, self.collection_name
        );
        Ok(())
    }

    async fn query(&self, query: ChromaQuery) -> Result<ChromaQueryResponse, StoreError> {
        let embeddings = embed_in_order(
            self.embedder.as_ref(),
            &query.query_texts,
            EmbeddingMode::Query,
            1,
            BACKEND,
        )
        .await?;

        let store = self.records.read().await;
        let mut response = ChromaQueryResponse::default();
        let mut documents = Vec::with_capacity(embeddings.len());
        let mut metadatas = Vec::with_capacity(embeddings.len());
        let mut distances = Vec::with_capacity(embeddings.len());

        for embedding in &embeddings {
            let mut scored: Vec<(&String, &StoredRecord, f32)> = Vec::new();
            for (id, record) in store.iter() {
                if let Some(clause) = &query.where_clause {
                    if !where_matches(clause, record.metadata.as_ref())? {
                        continue;
                    }
                }
                let distance = 1.0 - cosine_similarity(embedding, &record.embedding);
                scored.push((id, record, distance));
            }

            scored.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));
            scored.truncate(query.n_results);

            response
                .ids
                .push(scored.iter().map(|(id, _, _)| (*id).clone()).collect());
            documents.push(
                scored
                    .iter()
                    .map(|(_, r, _)| Some(r.document.clone()))
                    .collect(),
            );
            metadatas.push(scored.iter().map(|(_, r, _)| r.metadata.clone()).collect());
            distances.push(scored.iter().map(|(_, _, d)| Some(*d)).collect());
        }

        response.documents = Some(documents);
        response.metadatas = Some(metadatas);
        response.distances = Some(distances);
        Ok(response)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut store = self.records.write().await;
        let mut next = store.clone();
        for id in ids {
            next.remove(id);
        }
        let removed = store.len() - next.len();
        if removed > 0 {
            self.persist(&next).await?;
            *store = next;
        }
        debug!(
            "Deleted {} of {} requested records from {}",
            removed,
            ids.len(),
            self.collection_name
        );
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }

    fn stats(&self) -> BTreeMap<String, Value> {
        let mut stats = BTreeMap::new();
        let location = match &self.persist_path {
            Some(path) => path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            None => "in-memory".to_string(),
        };
        stats.insert("persist_directory".to_string(), Value::String(location));
        stats.insert(
            "embedding_model".to_string(),
            Value::String(self.embedder.model_name().to_string()),
        );
        stats
    }
}

pub fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(StoreError::config(format!(
            "Invalid collection name '{}': use ASCII letters, digits, '.', '_' or '-'",
            name
        )));
    }
    Ok(())
}

/// Evaluate a Chroma `where` clause. Supports `$and`/`$or`, the comparison
/// operators `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, the membership
/// operators `$in`/`$nin`, and bare values as equality.
fn where_matches(
    clause: &Value,
    metadata: Option<&Map<String, Value>>,
) -> Result<bool, StoreError> {
    let Value::Object(conditions) = clause else {
        return Err(StoreError::backend(
            BACKEND,
            format!("invalid where clause: {}", clause),
        ));
    };

    for (key, condition) in conditions {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in as_clause_list(key, condition)? {
                    if !where_matches(sub, metadata)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in as_clause_list(key, condition)? {
                    if where_matches(sub, metadata)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            field => {
                let value = metadata.and_then(|m| m.get(field));
                field_matches(value, condition)?
            }
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn as_clause_list<'a>(key: &str, condition: &'a Value) -> Result<&'a Vec<Value>, StoreError> {
    condition
        .as_array()
        .ok_or_else(|| StoreError::backend(BACKEND, format!("{} expects a list of clauses", key)))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> Result<bool, StoreError> {
    let Value::Object(operators) = condition else {
        return Ok(value.is_some_and(|v| json_eq(v, condition)));
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => value.is_some_and(|v| json_eq(v, operand)),
            "$ne" => !value.is_some_and(|v| json_eq(v, operand)),
            "$in" => value.is_some_and(|v| list_contains(operand, v)),
            "$nin" => !value.is_some_and(|v| list_contains(operand, v)),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                match (value.and_then(Value::as_f64), operand.as_f64()) {
                    (Some(lhs), Some(rhs)) => match op.as_str() {
                        "$gt" => lhs > rhs,
                        "$gte" => lhs >= rhs,
                        "$lt" => lhs < rhs,
                        _ => lhs <= rhs,
                    },
                    _ => false,
                }
            }
            other => {
                return Err(StoreError::backend(
                    BACKEND,
                    format!("unsupported where operator '{}'", other),
                ))
            }
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn list_contains(list: &Value, value: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| json_eq(item, value)))
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}
