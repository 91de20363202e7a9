use async_trait::async_trait;

use crate::domain::{
    BackendKind, CollectionInfo, Document, Metadata, QueryFilter, QueryResult, StoreError,
};

/// The capability contract every backend adapter implements.
///
/// Scores in returned [`QueryResult`]s are always higher-is-better; adapters
/// normalize whatever convention their backend uses.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Upsert `documents` under `ids`. Length mismatches fail with
    /// [`StoreError::Validation`] before anything reaches the backend.
    async fn add(
        &self,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<(), StoreError>;

    /// Return at most `top_k` results ordered by descending score.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryResult>, StoreError>;

    /// Remove records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), StoreError>;

    async fn describe(&self) -> Result<CollectionInfo, StoreError>;

    async fn add_documents(&self, documents: &[Document]) -> Result<(), StoreError> {
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let metadatas: Vec<Metadata> = documents.iter().map(|d| d.metadata.clone()).collect();
        self.add(&texts, &ids, Some(&metadatas)).await
    }
}
