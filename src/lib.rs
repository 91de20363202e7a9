pub mod application;
pub mod connector;
pub mod domain;

pub use application::{
    EmbeddingMode, EmbeddingProvider, LoadDirectoryUseCase, StoreManager, TextEmbedding,
    VectorStore,
};

pub use connector::{
    load_api_key, load_store_config, HashingEmbedding, Store, StoreFactory, DEFAULT_CONFIG_PATH,
};

#[cfg(feature = "chromadb")]
pub use connector::{ChromaEngine, ChromaSettings, ChromaVectorStore, LocalChromaEngine};

#[cfg(feature = "pinecone")]
pub use connector::{IndexService, IndexSpec, PineconeSettings, PineconeVectorStore};

pub use domain::{
    BackendKind, CollectionInfo, CollectionStatus, Document, Metadata, MetadataValue, QueryFilter,
    QueryResult, StoreConfig, StoreError,
};
