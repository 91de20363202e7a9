use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromadb::client::{ChromaAuthMethod, ChromaClient, ChromaClientOptions};
use chromadb::collection::{CollectionEntries, QueryOptions};
use chromadb::ChromaCollection;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{embed_in_order, ChromaEngine, ChromaQuery, ChromaQueryResponse, ChromaRecords};
use crate::application::{EmbeddingMode, EmbeddingProvider};
use crate::domain::StoreError;

const BACKEND: &str = "chromadb";
pub const DEFAULT_DATABASE: &str = "default_database";

/// Where and how to reach a Chroma server.
#[derive(Debug, Clone)]
pub struct ChromaHttpOptions {
    pub url: String,
    pub database: String,
    pub collection_name: String,
    pub timeout: Duration,
}

impl ChromaHttpOptions {
    pub fn new(url: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: DEFAULT_DATABASE.to_string(),
            collection_name: collection_name.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Chroma server collection reached through the `chromadb` client.
///
/// Chroma servers store vectors; like Chroma's own clients, this engine
/// carries the collection's embedding function and computes vectors before
/// each upsert or query, so callers only ever hand it text.
pub struct ChromaHttpEngine {
    collection: Arc<Mutex<ChromaCollection>>,
    url: String,
    database: String,
    collection_name: String,
    timeout: Duration,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ChromaHttpEngine {
    /// Connect and get-or-create the collection with cosine distance.
    pub async fn connect(
        options: ChromaHttpOptions,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, StoreError> {
        let url = options.url.trim_end_matches('/').to_string();
        let client = within(
            options.timeout,
            "connect",
            ChromaClient::new(ChromaClientOptions {
                url: Some(url.clone()),
                database: options.database.clone(),
                auth: ChromaAuthMethod::None,
            }),
        )
        .await?;

        debug!("Connected to ChromaDB at {}", url);

        let mut space = Map::new();
        space.insert("hnsw:space".to_string(), Value::String("cosine".to_string()));
        let collection = within(
            options.timeout,
            "get_or_create collection",
            client.get_or_create_collection(&options.collection_name, Some(space)),
        )
        .await?;

        info!(
            "Using ChromaDB collection {} at {} ({})",
            options.collection_name, url, options.database
        );

        Ok(Self {
            collection: Arc::new(Mutex::new(collection)),
            url,
            database: options.database,
            collection_name: options.collection_name,
            timeout: options.timeout,
            embedder,
        })
    }
}

#[async_trait]
impl ChromaEngine for ChromaHttpEngine {
    async fn upsert(&self, records: ChromaRecords) -> Result<(), StoreError> {
        let embeddings = embed_in_order(
            self.embedder.as_ref(),
            &records.documents,
            EmbeddingMode::Passage,
            1,
            BACKEND,
        )
        .await?;

        let entries = CollectionEntries {
            ids: records.ids.iter().map(String::as_str).collect(),
            embeddings: Some(embeddings),
            metadatas: entry_metadatas(&records.metadatas),
            documents: Some(records.documents.iter().map(String::as_str).collect()),
        };

        let collection = self.collection.lock().await;
        within(self.timeout, "upsert", collection.upsert(entries, None)).await?;

        debug!(
            "Upserted {} records to ChromaDB collection {}",
            records.len(),
            self.collection_name
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

        let options = QueryOptions {
            query_texts: None,
            query_embeddings: Some(embeddings),
            where_metadata: query.where_clause,
            where_document: None,
            n_results: Some(query.n_results),
            include: Some(vec!["documents", "metadatas", "distances"]),
        };

        let collection = self.collection.lock().await;
        let result = within(self.timeout, "query", collection.query(options, None)).await?;

        Ok(ChromaQueryResponse {
            ids: result.ids,
            documents: result.documents.map(present_rows),
            metadatas: result.metadatas,
            distances: result.distances.map(present_rows),
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let count = ids.len();

        let collection = self.collection.lock().await;
        within(self.timeout, "delete", collection.delete(Some(ids), None, None)).await?;

        debug!("Deleted {} ids from ChromaDB", count);
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let collection = self.collection.lock().await;
        let count = within(self.timeout, "count", collection.count()).await?;
        Ok(count as u64)
    }

    fn stats(&self) -> BTreeMap<String, Value> {
        let mut stats = BTreeMap::new();
        stats.insert("url".to_string(), Value::String(self.url.clone()));
        stats.insert("database".to_string(), Value::String(self.database.clone()));
        stats.insert(
            "embedding_model".to_string(),
            Value::String(self.embedder.model_name().to_string()),
        );
        stats
    }
}

/// Run one client call under the engine's timeout. Failures and expiry are
/// both reported as backend errors naming the action.
async fn within<T, E: Display>(
    timeout: Duration,
    action: &str,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::backend(
            BACKEND,
            format!("{} request failed: {}", action, e),
        )),
        Err(_) => Err(StoreError::backend(
            BACKEND,
            format!("{} request timed out after {:?}", action, timeout),
        )),
    }
}

/// Chroma takes one metadata map per record or none at all. Records without
/// metadata get an empty map when others in the batch carry some.
fn entry_metadatas(
    metadatas: &[Option<Map<String, Value>>],
) -> Option<Vec<Map<String, Value>>> {
    if metadatas.iter().all(Option::is_none) {
        return None;
    }
    Some(
        metadatas
            .iter()
            .map(|m| m.clone().unwrap_or_default())
            .collect(),
    )
}

fn present_rows<T>(rows: Vec<Vec<T>>) -> Vec<Vec<Option<T>>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(Some).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::HashingEmbedding;
    use serde_json::json;

    fn map(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    #[test]
    fn test_metadata_is_omitted_when_no_record_has_any() {
        assert_eq!(entry_metadatas(&[None, None]), None);
    }

    #[test]
    fn test_missing_metadata_is_padded_in_mixed_batches() {
        let metadatas = entry_metadatas(&[map(json!({"source": "notion"})), None]).unwrap();

        assert_eq!(metadatas.len(), 2);
        assert_eq!(metadatas[0].get("source"), Some(&json!("notion")));
        assert!(metadatas[1].is_empty());
    }

    #[test]
    fn test_query_rows_keep_their_shape() {
        let rows = present_rows(vec![vec![0.25f32, 1.5], vec![]]);

        assert_eq!(rows, vec![vec![Some(0.25), Some(1.5)], vec![]]);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_as_backend_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<u64, String>(1)
        };

        let err = within(Duration::from_millis(20), "count", slow)
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert_eq!(err.backend_name(), Some("chromadb"));
        assert!(err.to_string().contains("count request timed out"));
    }

    #[tokio::test]
    async fn test_client_errors_name_the_action() {
        let failing = async { Err::<(), _>("collection not found") };

        let err = within(Duration::from_secs(1), "delete", failing)
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert!(err.to_string().contains("delete request failed: collection not found"));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut options = ChromaHttpOptions::new(format!("http://{}", addr), "docs");
        options.timeout = Duration::from_secs(5);
        let err = ChromaHttpEngine::connect(options, Arc::new(HashingEmbedding::new()))
            .await
            .err()
            .unwrap();

        assert!(err.is_backend());
    }
}
