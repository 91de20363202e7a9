use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::embed_in_order;
use super::{IndexHandle, IndexService, IndexSpec, VectorQuery, VectorRecord};
use crate::application::{EmbeddingMode, EmbeddingProvider, VectorStore};
use crate::domain::{
    metadata_from_json, metadata_to_json, rank_results, validate_top_k, BackendKind,
    CollectionInfo, CollectionStatus, Document, Metadata, QueryFilter, QueryResult, StoreError,
};

const BACKEND: &str = "pinecone";

/// Metadata key holding the document text. Pinecone stores vectors only.
pub const TEXT_METADATA_KEY: &str = "text";

pub const UPSERT_BATCH_SIZE: usize = 100;
const DELETE_BATCH_SIZE: usize = 1000;
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// Adapter for a managed index that stores raw vectors and needs the text
/// embedded on the client side.
///
/// Scores are passed through from the index. Whether they are comparable
/// across queries depends on the index metric.
///
/// When the embedding provider has no separate query mode, queries are
/// embedded as passages. Asymmetric models lose some recall this way.
pub struct PineconeVectorStore {
    index_name: String,
    index_service: Arc<dyn IndexService>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_concurrency: usize,
    index_spec: IndexSpec,
    handle: OnceCell<IndexHandle>,
}

impl PineconeVectorStore {
    pub fn new(
        index_name: impl Into<String>,
        index_service: Arc<dyn IndexService>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            index_service,
            embedder,
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
            index_spec: IndexSpec::default(),
            handle: OnceCell::new(),
        }
    }

    pub fn with_embed_concurrency(mut self, concurrency: usize) -> Self {
        self.embed_concurrency = concurrency.max(1);
        self
    }

    /// [`IndexSpec`] used by [`PineconeVectorStore::create_index`] when none is given.
    pub fn with_index_spec(mut self, spec: IndexSpec) -> Self {
        self.index_spec = spec;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Create the index if it does not exist yet. Safe to call repeatedly.
    pub async fn create_index(&self, spec: Option<&IndexSpec>) -> Result<(), StoreError> {
        if self.handle.get().is_some() {
            debug!("Pinecone index {} already resolved", self.index_name);
            return Ok(());
        }

        let spec = spec.unwrap_or(&self.index_spec);
        let handle = match self.index_service.describe_index(&self.index_name).await? {
            Some(existing) => {
                info!("Pinecone index {} already exists", self.index_name);
                existing
            }
            None => self.index_service.create_index(&self.index_name, spec).await?,
        };

        // A concurrent resolution may have filled the cell first; both hold
        // the same index.
        let _ = self.handle.set(handle);
        Ok(())
    }

    /// The bound index, resolved on first use and cached once found.
    async fn index(&self) -> Result<&IndexHandle, StoreError> {
        self.handle
            .get_or_try_init(|| async {
                debug!("Resolving Pinecone index {}", self.index_name);
                self.index_service
                    .describe_index(&self.index_name)
                    .await?
                    .ok_or_else(|| StoreError::not_initialized("Pinecone", self.index_name.clone()))
            })
            .await
    }

    fn check_reserved_keys(batch: &[Document]) -> Result<(), StoreError> {
        match batch
            .iter()
            .find(|doc| doc.metadata.contains_key(TEXT_METADATA_KEY))
        {
            Some(doc) => Err(StoreError::validation(format!(
                "Metadata key '{}' is reserved for the document text (document '{}')",
                TEXT_METADATA_KEY, doc.id
            ))),
            None => Ok(()),
        }
    }

    fn query_mode(&self) -> EmbeddingMode {
        if self.embedder.supports_query_mode() {
            EmbeddingMode::Query
        } else {
            debug!(
                "Embedding model {} has no query mode, embedding query as passage",
                self.embedder.model_name()
            );
            EmbeddingMode::Passage
        }
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Pinecone
    }

    async fn add(
        &self,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<(), StoreError> {
        let batch = Document::batch(documents, ids, metadatas)?;
        Self::check_reserved_keys(&batch)?;
        if batch.is_empty() {
            return Ok(());
        }

        let index = self.index().await?;

        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let vectors = embed_in_order(
            self.embedder.as_ref(),
            &texts,
            EmbeddingMode::Passage,
            self.embed_concurrency,
            BACKEND,
        )
        .await?;

        let records: Vec<VectorRecord> = batch
            .into_iter()
            .zip(vectors)
            .map(|(doc, values)| {
                let mut metadata = metadata_to_json(&doc.metadata);
                metadata.insert(TEXT_METADATA_KEY.to_string(), Value::String(doc.text));
                VectorRecord {
                    id: doc.id,
                    values,
                    metadata,
                }
            })
            .collect();

        for chunk in records.chunks(UPSERT_BATCH_SIZE) {
            self.index_service.upsert(index, chunk).await?;
        }

        debug!(
            "Successfully added {} documents to Pinecone index {}",
            records.len(),
            self.index_name
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

        let index = self.index().await?;

        let mut vectors = embed_in_order(
            self.embedder.as_ref(),
            &[text.to_string()],
            self.query_mode(),
            1,
            BACKEND,
        )
        .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| StoreError::backend(BACKEND, "no embedding returned for query"))?;

        let matches = self
            .index_service
            .query(
                index,
                &VectorQuery {
                    vector,
                    top_k,
                    filter: filter.and_then(QueryFilter::to_where_clause),
                    include_metadata: true,
                },
            )
            .await?;

        let results = matches
            .into_iter()
            .map(|m| {
                let mut metadata = m.metadata.unwrap_or_default();
                let document = match metadata.remove(TEXT_METADATA_KEY) {
                    Some(Value::String(s)) => s,
                    _ => String::new(),
                };
                QueryResult::new(m.id, document, m.score)
                    .with_metadata(metadata_from_json(&metadata))
            })
            .collect();

        let results = rank_results(results, top_k);
        debug!(
            "Pinecone query on {} returned {} results",
            self.index_name,
            results.len()
        );
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let index = self.index().await?;
        for chunk in ids.chunks(DELETE_BATCH_SIZE) {
            self.index_service.delete(index, chunk).await?;
        }
        debug!("Successfully deleted {} documents from Pinecone", ids.len());
        Ok(())
    }

    async fn describe(&self) -> Result<CollectionInfo, StoreError> {
        let index = match self.index().await {
            Ok(index) => index,
            Err(e) if e.is_not_initialized() => {
                return Ok(CollectionInfo::new(
                    self.index_name.clone(),
                    BackendKind::Pinecone,
                    CollectionStatus::NotInitialized,
                )
                .with_stat("exists", false));
            }
            Err(e) => return Err(e),
        };

        let stats = self.index_service.describe_index_stats(index).await?;
        let mut info = CollectionInfo::new(
            self.index_name.clone(),
            BackendKind::Pinecone,
            CollectionStatus::Initialized,
        )
        .with_document_count(stats.total_vector_count)
        .with_stat("exists", true)
        .with_stat("total_vector_count", stats.total_vector_count)
        .with_stat("index_fullness", stats.index_fullness)
        .with_stat("embedding_model", self.embedder.model_name());

        if let Some(dimension) = stats.dimension.or(index.dimension) {
            info = info.with_stat("dimension", dimension);
        }
        Ok(info)
    }
}
