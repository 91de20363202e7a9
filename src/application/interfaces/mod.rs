mod embedding_provider;
mod vector_store;

pub use embedding_provider::*;
pub use vector_store::*;
