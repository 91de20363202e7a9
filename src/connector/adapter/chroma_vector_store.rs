use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ChromaEngine, ChromaQuery, ChromaQueryResponse, ChromaRecords};
use crate::application::VectorStore;
use crate::domain::{
    metadata_from_json, metadata_to_json, rank_results, validate_top_k, BackendKind,
    CollectionInfo, CollectionStatus, Document, Metadata, QueryFilter, QueryResult, StoreError,
};

const BACKEND: &str = "chromadb";

/// Adapter for backends that embed text themselves and report distances.
///
/// Scores are `1 - distance`: a linear similarity heuristic, not a
/// probability. With cosine distance it lies in `[-1, 1]`; with L2 it can be
/// arbitrarily negative.
pub struct ChromaVectorStore {
    collection_name: String,
    engine: Arc<dyn ChromaEngine>,
}

impl ChromaVectorStore {
    pub fn new(collection_name: impl Into<String>, engine: Arc<dyn ChromaEngine>) -> Self {
        Self {
            collection_name: collection_name.into(),
            engine,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn to_records(batch: Vec<Document>) -> ChromaRecords {
        let mut records = ChromaRecords::default();
        for doc in batch {
            records.ids.push(doc.id);
            records.documents.push(doc.text);
            // Chroma rejects empty metadata objects.
            records.metadatas.push(if doc.metadata.is_empty() {
                None
            } else {
                Some(metadata_to_json(&doc.metadata))
            });
        }
        records
    }

    fn to_results(response: ChromaQueryResponse) -> Result<Vec<QueryResult>, StoreError> {
        let ids = response.ids.into_iter().next().unwrap_or_default();
        let mut documents = response
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = response
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let distance = distances.next().flatten().ok_or_else(|| {
                StoreError::backend(
                    BACKEND,
                    format!("query response has no distance for '{}'", id),
                )
            })?;
            let document = documents.next().flatten().unwrap_or_default();
            let metadata = metadatas
                .next()
                .flatten()
                .map(|m| metadata_from_json(&m))
                .unwrap_or_else(Metadata::new);

            results.push(QueryResult::new(id, document, 1.0 - distance).with_metadata(metadata));
        }

        Ok(results)
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    fn backend(&self) -> BackendKind {
        BackendKind::ChromaDb
    }

    async fn add(
        &self,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<(), StoreError> {
        let batch = Document::batch(documents, ids, metadatas)?;
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        self.engine.upsert(Self::to_records(batch)).await?;

        debug!(
            "Successfully added {} documents to ChromaDB collection {}",
            count, self.collection_name
        );
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>, StoreError> {
        validate_top_k(top_k)?;
        if let Some(filter) = filter {
            filter.validate()?;
        }

        let response = self
            .engine
            .query(ChromaQuery {
                query_texts: vec![text.to_string()],
                n_results: top_k,
                where_clause: filter.and_then(QueryFilter::to_where_clause),
            })
            .await?;

        let results = rank_results(Self::to_results(response)?, top_k);
        debug!(
            "ChromaDB query on {} returned {} results",
            self.collection_name,
            results.len()
        );
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.engine.delete(ids).await?;
        debug!(
            "Successfully deleted {} documents from ChromaDB",
            ids.len()
        );
        Ok(())
    }

    async fn describe(&self) -> Result<CollectionInfo, StoreError> {
        let count = self.engine.count().await?;
        let mut info = CollectionInfo::new(
            self.collection_name.clone(),
            BackendKind::ChromaDb,
            CollectionStatus::Initialized,
        )
        .with_document_count(count);
        info.stats.extend(self.engine.stats());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::domain::MetadataValue;

    /// Replays a canned response and counts calls.
    #[derive(Default)]
    struct ScriptedEngine {
        calls: AtomicUsize,
        response: ChromaQueryResponse,
        fail: bool,
        last_upsert: Mutex<Option<ChromaRecords>>,
        last_query: Mutex<Option<ChromaQuery>>,
    }

    impl ScriptedEngine {
        fn check(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::backend(BACKEND, "connection refused"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChromaEngine for ScriptedEngine {
        async fn upsert(&self, records: ChromaRecords) -> Result<(), StoreError> {
            self.check()?;
            *self.last_upsert.lock().unwrap() = Some(records);
            Ok(())
        }

        async fn query(&self, query: ChromaQuery) -> Result<ChromaQueryResponse, StoreError> {
            self.check()?;
            *self.last_query.lock().unwrap() = Some(query);
            Ok(self.response.clone())
        }

        async fn delete(&self, _ids: &[String]) -> Result<(), StoreError> {
            self.check()
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.check()?;
            Ok(7)
        }

        fn stats(&self) -> BTreeMap<String, Value> {
            BTreeMap::from([("persist_directory".to_string(), json!("./chroma_store"))])
        }
    }

    fn store(engine: Arc<ScriptedEngine>) -> ChromaVectorStore {
        ChromaVectorStore::new("docs", engine)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_length_mismatch_makes_no_engine_call() {
        let engine = Arc::new(ScriptedEngine::default());
        let err = store(engine.clone())
            .add(&strings(&["a", "b"]), &strings(&["1"]), None)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_add_sends_null_for_empty_metadata() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut tagged = Metadata::new();
        tagged.insert("source".to_string(), "notion".into());

        store(engine.clone())
            .add(
                &strings(&["first", "second"]),
                &strings(&["1", "2"]),
                Some(&[tagged, Metadata::new()]),
            )
            .await
            .unwrap();

        let records = engine.last_upsert.lock().unwrap().clone().unwrap();
        assert_eq!(records.ids, strings(&["1", "2"]));
        assert_eq!(records.metadatas[0], json!({"source": "notion"}).as_object().cloned());
        assert_eq!(records.metadatas[1], None);
    }

    #[tokio::test]
    async fn test_query_converts_distance_to_score() {
        let engine = Arc::new(ScriptedEngine {
            response: serde_json::from_value(json!({
                "ids": [["doc1", "doc2"]],
                "documents": [["This is document1", "This is document2"]],
                "metadatas": [[{"source": "notion"}, null]],
                "distances": [[0.25, 1.5]]
            }))
            .unwrap(),
            ..Default::default()
        });

        let results = store(engine.clone())
            .query("q", 2, Some(&QueryFilter::eq("source", "notion")))
            .await
            .unwrap();

        assert_eq!(results[0].id, "doc1");
        assert!((results[0].score - 0.75).abs() < 1e-6);
        // 1 - distance is kept even when it goes negative.
        assert!((results[1].score + 0.5).abs() < 1e-6);
        assert_eq!(
            results[0].metadata.get("source"),
            Some(&MetadataValue::from("notion"))
        );
        assert!(results[1].metadata.is_empty());

        let query = engine.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.n_results, 2);
        assert_eq!(query.where_clause, Some(json!({"source": {"$eq": "notion"}})));
    }

    #[tokio::test]
    async fn test_query_rejects_zero_top_k_without_engine_call() {
        let engine = Arc::new(ScriptedEngine::default());
        let err = store(engine.clone()).query("q", 0, None).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_rejects_empty_in_filter_without_engine_call() {
        let engine = Arc::new(ScriptedEngine::default());
        let filter = QueryFilter::and(vec![
            QueryFilter::eq("source", "notion"),
            QueryFilter::is_in("year", Vec::<i64>::new()),
        ]);

        let err = store(engine.clone())
            .query("q", 3, Some(&filter))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_not_swallowed() {
        let engine = Arc::new(ScriptedEngine {
            fail: true,
            ..Default::default()
        });

        let err = store(engine).query("q", 3, None).await.unwrap_err();

        assert!(err.is_backend());
        assert_eq!(err.backend_name(), Some("chromadb"));
    }

    #[tokio::test]
    async fn test_describe_reports_count_and_location() {
        let info = store(Arc::new(ScriptedEngine::default()))
            .describe()
            .await
            .unwrap();

        assert_eq!(info.name, "docs");
        assert_eq!(info.document_count, Some(7));
        assert_eq!(info.stats.get("persist_directory"), Some(&json!("./chroma_store")));
    }
}
