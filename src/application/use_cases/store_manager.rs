use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use crate::application::VectorStore;
use crate::domain::{CollectionInfo, QueryResult, StoreError};

/// Characters of document text shown per search hit.
const PREVIEW_CHARS: usize = 1000;

/// Presentation facade over any [`VectorStore`].
pub struct StoreManager {
    store: Arc<dyn VectorStore>,
}

impl StoreManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Query the store and render the hits as a numbered listing.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<String, StoreError> {
        let results = self.store.query(query, top_k, None).await?;
        info!(
            "{} search for '{}' returned {} results",
            self.store.backend(),
            query,
            results.len()
        );
        Ok(render_results(query, &results))
    }

    pub async fn info(&self) -> Result<String, StoreError> {
        let info = self.store.describe().await?;
        Ok(render_info(&info))
    }
}

pub fn render_results(query: &str, results: &[QueryResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSearch results for: '{}'", query);
    let _ = writeln!(out, "{}", "-".repeat(50));

    if results.is_empty() {
        let _ = writeln!(out, "No results found.");
        return out;
    }

    for (i, result) in results.iter().enumerate() {
        let preview: String = result.document.chars().take(PREVIEW_CHARS).collect();
        let metadata = serde_json::to_string(&result.metadata).unwrap_or_default();

        let _ = writeln!(out, "{}. Score: {:.4}", i + 1, result.score);
        let _ = writeln!(out, "   ID: {}", result.id);
        let _ = writeln!(out, "   Document: {}...", preview);
        let _ = writeln!(out, "   Metadata: {}", metadata);
        let _ = writeln!(out);
    }

    out
}

pub fn render_info(info: &CollectionInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nVector Store Information:");
    let _ = writeln!(out, "{}", "-".repeat(30));
    let _ = writeln!(out, "name: {}", info.name);
    let _ = writeln!(out, "type: {}", info.backend);
    let _ = writeln!(out, "status: {}", info.status);
    if let Some(count) = info.document_count {
        let _ = writeln!(out, "document_count: {}", count);
    }
    for (key, value) in &info.stats {
        match value {
            serde_json::Value::String(s) => {
                let _ = writeln!(out, "{}: {}", key, s);
            }
            other => {
                let _ = writeln!(out, "{}: {}", key, other);
            }
        }
    }
    out
}
