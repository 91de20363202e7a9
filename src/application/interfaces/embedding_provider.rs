use async_trait::async_trait;

use crate::domain::StoreError;

/// Whether text is embedded as stored content or as a search query.
/// Asymmetric models (e5, llama-text-embed) produce different vectors for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Passage,
    Query,
}

impl EmbeddingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMode::Passage => "passage",
            EmbeddingMode::Query => "query",
        }
    }
}

/// One vector returned by a provider, tagged with the position of its input
/// text within the request. Providers may return embeddings in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEmbedding {
    pub index: usize,
    pub values: Vec<f32>,
}

impl TextEmbedding {
    pub fn new(index: usize, values: Vec<f32>) -> Self {
        Self { index, values }
    }
}

/// Turns batches of text into fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed at most [`max_batch_size`](Self::max_batch_size) texts.
    async fn embed(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> Result<Vec<TextEmbedding>, StoreError>;

    fn model_name(&self) -> &str;

    /// Largest number of inputs accepted by a single [`embed`](Self::embed) call.
    fn max_batch_size(&self) -> usize;

    /// `false` when the model embeds queries and passages identically.
    fn supports_query_mode(&self) -> bool {
        true
    }
}
