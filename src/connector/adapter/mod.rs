mod embedding_batches;
mod hashing_embedding;

#[cfg(feature = "chromadb")]
mod chroma_engine;
#[cfg(feature = "chromadb")]
mod chroma_http_engine;
#[cfg(feature = "chromadb")]
mod chroma_vector_store;
#[cfg(feature = "chromadb")]
mod local_chroma_engine;

#[cfg(feature = "pinecone")]
mod pinecone_client;
#[cfg(feature = "pinecone")]
mod pinecone_http_client;
#[cfg(feature = "pinecone")]
mod pinecone_inference;
#[cfg(feature = "pinecone")]
mod pinecone_vector_store;

pub use embedding_batches::*;
pub use hashing_embedding::*;

#[cfg(feature = "chromadb")]
pub use chroma_engine::*;
#[cfg(feature = "chromadb")]
pub use chroma_http_engine::*;
#[cfg(feature = "chromadb")]
pub use chroma_vector_store::*;
#[cfg(feature = "chromadb")]
pub use local_chroma_engine::*;

#[cfg(feature = "pinecone")]
pub use pinecone_client::*;
#[cfg(feature = "pinecone")]
pub use pinecone_http_client::{PineconeHttpClient, DEFAULT_CONTROLLER_URL, PINECONE_API_VERSION};
#[cfg(feature = "pinecone")]
pub use pinecone_inference::*;
#[cfg(feature = "pinecone")]
pub use pinecone_vector_store::*;
