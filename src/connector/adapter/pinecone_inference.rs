use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::pinecone_http_client::{check, parse, request_failed, PINECONE_API_VERSION};
use crate::application::{EmbeddingMode, EmbeddingProvider, TextEmbedding};
use crate::domain::StoreError;

/// Input ceiling per request for Pinecone-hosted models such as
/// `multilingual-e5-large`.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 96;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    parameters: EmbedParameters,
    inputs: Vec<EmbedInput<'a>>,
}

#[derive(Serialize)]
struct EmbedParameters {
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Serialize)]
struct EmbedInput<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    values: Vec<f32>,
}

/// [`EmbeddingProvider`] backed by Pinecone's inference `/embed` endpoint.
pub struct PineconeInference {
    client: reqwest::Client,
    api_key: String,
    embed_url: String,
    model: String,
    max_batch_size: usize,
}

impl PineconeInference {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        controller_url: &str,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            embed_url: format!("{}/embed", controller_url.trim_end_matches('/')),
            model: model.into(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for PineconeInference {
    async fn embed(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> Result<Vec<TextEmbedding>, StoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            parameters: EmbedParameters {
                input_type: mode.as_str(),
                truncate: "END",
            },
            inputs: texts.iter().map(|t| EmbedInput { text: t }).collect(),
        };

        let response = self
            .client
            .post(&self.embed_url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed("embed", e))?;

        let parsed: EmbedResponse = parse(check(response, "embed").await?, "embed").await?;

        // The endpoint answers in input order.
        Ok(parsed
            .data
            .into_iter()
            .enumerate()
            .map(|(i, d)| TextEmbedding::new(i, d.values))
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
