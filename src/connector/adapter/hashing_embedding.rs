use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::{EmbeddingMode, EmbeddingProvider, TextEmbedding};
use crate::domain::StoreError;

const DEFAULT_DIMENSIONS: usize = 384;
const MAX_BATCH_SIZE: usize = 1024;
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Local embedding function for the in-process Chroma engine.
///
/// Feature-hashes lowercase words and their padded character trigrams into a
/// fixed number of buckets, then L2-normalizes. All components are
/// non-negative, so cosine similarity between two outputs lies in `[0, 1]`.
/// Buckets come from SHA-256 so persisted vectors stay valid across builds.
pub struct HashingEmbedding {
    model_name: String,
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            model_name: format!("hashing-tf-{}", dimensions),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            vector[self.bucket(&format!("w:{}", word))] += WORD_WEIGHT;

            let padded: Vec<char> = format!("^{}$", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                vector[self.bucket(&format!("g:{}", gram))] += TRIGRAM_WEIGHT;
            }
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }

    fn bucket(&self, feature: &str) -> usize {
        let digest = Sha256::digest(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(
        &self,
        texts: &[String],
        _mode: EmbeddingMode,
    ) -> Result<Vec<TextEmbedding>, StoreError> {
        let embeddings: Vec<TextEmbedding> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| TextEmbedding::new(i, self.embed_text(text)))
            .collect();

        debug!("Generated {} hashing embeddings", embeddings.len());

        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn supports_query_mode(&self) -> bool {
        false
    }
}

/// Cosine similarity clamped to `[-1, 1]`; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embedding_consistency() {
        let service = HashingEmbedding::new();

        assert_eq!(service.embed_text("hello world"), service.embed_text("Hello,  WORLD"));
    }

    #[test]
    fn test_hashing_embedding_dimensions_and_norm() {
        let service = HashingEmbedding::with_dimensions(128);
        let embedding = service.embed_text("test");
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert_eq!(embedding.len(), 128);
        assert!((magnitude - 1.0).abs() < 0.001);
        assert!(embedding.iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let service = HashingEmbedding::new();
        assert!(service.embed_text("  ..  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_words_are_closer() {
        let service = HashingEmbedding::new();
        let query = service.embed_text("check your flight status");
        let close = service.embed_text("you can check the status of your flight online");
        let far = service.embed_text("baking sourdough bread at home");

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn test_embed_tags_input_positions() {
        let service = HashingEmbedding::new();
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = service.embed(&texts, EmbeddingMode::Query).await.unwrap();

        assert_eq!(out[0].index, 0);
        assert_eq!(out[1].index, 1);
        assert_eq!(out[1].values, service.embed_text("b"));
    }
}
