use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{self, StreamExt};
use tracing::debug;

use crate::application::{EmbeddingMode, EmbeddingProvider, TextEmbedding};
use crate::domain::StoreError;

/// An in-flight sub-batch, tagged with where it starts in the input.
type SubBatch<'a> = Pin<
    Box<dyn Future<Output = Result<(usize, usize, Vec<TextEmbedding>), StoreError>> + Send + 'a>,
>;

/// Embed `texts` through `provider`, returning one vector per input in input
/// order.
///
/// Inputs are split into sub-batches of at most `provider.max_batch_size()`
/// and up to `concurrency` sub-batches run at once. Each returned
/// [`TextEmbedding`] is placed by its
/// `index`, so providers that reorder results are reconciled. Any failed,
/// short, duplicated or out-of-range sub-batch fails the whole call.
pub async fn embed_in_order(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    mode: EmbeddingMode,
    concurrency: usize,
    backend: &str,
) -> Result<Vec<Vec<f32>>, StoreError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = provider.max_batch_size().max(1);
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

    let sub_batches: Vec<SubBatch<'_>> = texts
        .chunks(batch_size)
        .map(<[String]>::to_vec)
        .enumerate()
        .map(|(n, chunk)| {
            let sub_batch: SubBatch<'_> = Box::pin(async move {
                let len = chunk.len();
                provider
                    .embed(&chunk, mode)
                    .await
                    .map(|embeddings| (n * batch_size, len, embeddings))
            });
            sub_batch
        })
        .collect();

    let mut pending = stream::iter(sub_batches).buffer_unordered(concurrency.max(1));

    while let Some(outcome) = pending.next().await {
        let (offset, len, embeddings) = outcome?;

        if embeddings.len() != len {
            return Err(StoreError::backend(
                backend,
                format!(
                    "{} returned {} embeddings for {} inputs",
                    provider.model_name(),
                    embeddings.len(),
                    len
                ),
            ));
        }

        for embedding in embeddings {
            if embedding.index >= len {
                return Err(StoreError::backend(
                    backend,
                    format!(
                        "{} returned embedding index {} for a batch of {}",
                        provider.model_name(),
                        embedding.index,
                        len
                    ),
                ));
            }
            let slot = &mut slots[offset + embedding.index];
            if slot.is_some() {
                return Err(StoreError::backend(
                    backend,
                    format!(
                        "{} returned embedding index {} twice",
                        provider.model_name(),
                        embedding.index
                    ),
                ));
            }
            *slot = Some(embedding.values);
        }

        debug!(
            "Embedded {} {} texts at offset {} with {}",
            len,
            mode.as_str(),
            offset,
            provider.model_name()
        );
    }

    let vectors: Vec<Vec<f32>> = slots.into_iter().flatten().collect();
    if vectors.len() != texts.len() {
        return Err(StoreError::backend(
            backend,
            format!("missing embeddings from {}", provider.model_name()),
        ));
    }

    let dimensions = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimensions) {
        return Err(StoreError::backend(
            backend,
            format!("{} returned vectors of mixed length", provider.model_name()),
        ));
    }

    Ok(vectors)
}
