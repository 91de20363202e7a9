use std::sync::Arc;
#[cfg(feature = "pinecone")]
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

#[cfg(feature = "chromadb")]
use super::{
    validate_collection_name, ChromaEngine, ChromaHttpEngine, ChromaHttpOptions, ChromaSettings,
    ChromaVectorStore, HashingEmbedding, LocalChromaEngine,
};
#[cfg(feature = "pinecone")]
use super::{
    IndexSpec, PineconeHttpClient, PineconeInference, PineconeSettings, PineconeVectorStore,
};
use crate::application::VectorStore;
use crate::domain::{
    BackendKind, CollectionInfo, Metadata, QueryFilter, QueryResult, StoreConfig, StoreError,
};

#[cfg(not(any(feature = "chromadb", feature = "pinecone")))]
compile_error!("enable at least one backend feature: `chromadb` or `pinecone`");

/// Every compiled-in backend adapter.
pub enum Store {
    #[cfg(feature = "chromadb")]
    Chroma(ChromaVectorStore),
    #[cfg(feature = "pinecone")]
    Pinecone(PineconeVectorStore),
}

impl Store {
    /// Create the backing index where the backend needs one. Collections
    /// that are created on connect make this a no-op.
    #[cfg(feature = "pinecone")]
    pub async fn create_index(&self, spec: Option<&IndexSpec>) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => {
                info!(
                    "ChromaDB collection {} is created on connect, nothing to do",
                    store.collection_name()
                );
                Ok(())
            }
            Store::Pinecone(store) => store.create_index(spec).await,
        }
    }

    pub fn into_shared(self) -> Arc<dyn VectorStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl VectorStore for Store {
    fn backend(&self) -> BackendKind {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => store.backend(),
            #[cfg(feature = "pinecone")]
            Store::Pinecone(store) => store.backend(),
        }
    }

    async fn add(
        &self,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => store.add(documents, ids, metadatas).await,
            #[cfg(feature = "pinecone")]
            Store::Pinecone(store) => store.add(documents, ids, metadatas).await,
        }
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>, StoreError> {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => store.query(text, top_k, filter).await,
            #[cfg(feature = "pinecone")]
            Store::Pinecone(store) => store.query(text, top_k, filter).await,
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => store.delete(ids).await,
            #[cfg(feature = "pinecone")]
            Store::Pinecone(store) => store.delete(ids).await,
        }
    }

    async fn describe(&self) -> Result<CollectionInfo, StoreError> {
        match self {
            #[cfg(feature = "chromadb")]
            Store::Chroma(store) => store.describe().await,
            #[cfg(feature = "pinecone")]
            Store::Pinecone(store) => store.describe().await,
        }
    }
}

/// Builds a [`Store`] from a backend name and its configuration.
pub struct StoreFactory;

impl StoreFactory {
    /// Names accepted by [`StoreFactory::create`] in this build.
    pub fn supported_backends() -> Vec<&'static str> {
        let mut names = Vec::new();
        #[cfg(feature = "chromadb")]
        names.push(BackendKind::ChromaDb.as_str());
        #[cfg(feature = "pinecone")]
        names.push(BackendKind::Pinecone.as_str());
        names
    }

    /// Dispatch on the backend name recorded in `config`.
    pub async fn from_config(config: &StoreConfig) -> Result<Store, StoreError> {
        Self::create(config.backend(), config).await
    }

    pub async fn create(backend_name: &str, config: &StoreConfig) -> Result<Store, StoreError> {
        match BackendKind::parse(backend_name) {
            #[cfg(feature = "chromadb")]
            Some(BackendKind::ChromaDb) => Self::create_chroma(config).await.map(Store::Chroma),
            #[cfg(feature = "pinecone")]
            Some(BackendKind::Pinecone) => Self::create_pinecone(config).map(Store::Pinecone),
            _ => Err(StoreError::unsupported_backend(
                backend_name,
                Self::supported_backends(),
            )),
        }
    }

    #[cfg(feature = "chromadb")]
    async fn create_chroma(config: &StoreConfig) -> Result<ChromaVectorStore, StoreError> {
        let settings: ChromaSettings = config.settings()?;
        validate_collection_name(&settings.collection_name)?;

        let embedder = Arc::new(HashingEmbedding::with_dimensions(
            settings.embedding_dimensions,
        ));

        let engine: Arc<dyn ChromaEngine> = match &settings.url {
            Some(url) => {
                let mut options = ChromaHttpOptions::new(url, &settings.collection_name);
                if let Some(database) = &settings.database {
                    options.database = database.clone();
                }
                options.timeout = std::time::Duration::from_secs(settings.timeout_secs);
                Arc::new(ChromaHttpEngine::connect(options, embedder).await?)
            }
            None => Arc::new(
                LocalChromaEngine::open(
                    settings.persist_directory.as_deref(),
                    &settings.collection_name,
                    embedder,
                )
                .await?,
            ),
        };

        info!("Using ChromaDB collection: {}", settings.collection_name);
        Ok(ChromaVectorStore::new(settings.collection_name, engine))
    }

    #[cfg(feature = "pinecone")]
    fn create_pinecone(config: &StoreConfig) -> Result<PineconeVectorStore, StoreError> {
        let settings: PineconeSettings = config.settings()?;
        let api_key = settings.resolve_api_key()?;

        let client = PineconeHttpClient::new(
            api_key.clone(),
            settings.controller_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?;
        let inference = PineconeInference::new(
            client.http_client(),
            api_key,
            &settings.controller_url,
            settings.embedding_model.clone(),
        )
        .with_max_batch_size(settings.embed_batch_size);

        info!(
            "Using Pinecone index {} with embedding model {}",
            settings.index_name, settings.embedding_model
        );
        Ok(PineconeVectorStore::new(
            settings.index_name.clone(),
            Arc::new(client),
            Arc::new(inference),
        )
        .with_embed_concurrency(settings.embed_concurrency)
        .with_index_spec(settings.index_spec()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_supported_backends_follow_features() {
        let names = StoreFactory::supported_backends();
        assert_eq!(names.contains(&"chromadb"), cfg!(feature = "chromadb"));
        assert_eq!(names.contains(&"pinecone"), cfg!(feature = "pinecone"));
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let config = StoreConfig::from_value("faiss", json!({}));

        let err = StoreFactory::from_config(&config).await.err().unwrap();

        assert!(err.is_unsupported_backend());
        assert!(err.to_string().contains("'faiss'"));
    }

    #[cfg(feature = "chromadb")]
    #[tokio::test]
    async fn test_backend_name_is_case_insensitive() {
        let config = StoreConfig::from_value("unused", json!({"persist_directory": null}));

        let store = StoreFactory::create("ChromaDB", &config).await.unwrap();

        assert_eq!(store.backend(), BackendKind::ChromaDb);
    }

    #[cfg(feature = "chromadb")]
    #[tokio::test]
    async fn test_invalid_collection_name_fails_construction() {
        let config = StoreConfig::from_value(
            "chromadb",
            json!({"persist_directory": null, "collection_name": "../escape"}),
        );

        let err = StoreFactory::from_config(&config).await.err().unwrap();

        assert!(err.is_config(), "{}", err);
    }

    #[cfg(feature = "pinecone")]
    #[tokio::test]
    async fn test_pinecone_missing_key_file_is_config_error() {
        let config = StoreConfig::from_value(
            "pinecone",
            json!({"key_file": "/nonexistent/pinecone_key.json"}),
        );

        let err = StoreFactory::from_config(&config).await.err().unwrap();

        assert!(err.is_config());
        assert!(err.to_string().contains("/nonexistent/pinecone_key.json"));
    }
}
