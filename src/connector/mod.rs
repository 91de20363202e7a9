//! # Connector Layer
//!
//! Backend adapters behind the [`crate::application::VectorStore`] contract:
//! - ChromaDB-style collections (in-process engine or Chroma server)
//! - Pinecone-style indexes with client-side embedding
//! - Configuration loading and the store factory

pub mod adapter;
pub mod config;
pub mod factory;

pub use adapter::*;
pub use config::*;
pub use factory::*;
