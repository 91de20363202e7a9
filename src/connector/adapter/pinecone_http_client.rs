use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    IndexHandle, IndexService, IndexSpec, IndexStats, ScoredVector, VectorQuery, VectorRecord,
};
use crate::domain::StoreError;

const BACKEND: &str = "pinecone";
pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";
pub const PINECONE_API_VERSION: &str = "2025-01";

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    host: String,
    #[serde(default)]
    dimension: Option<u32>,
}

impl From<IndexDescription> for IndexHandle {
    fn from(description: IndexDescription) -> Self {
        IndexHandle {
            name: description.name,
            host: description.host,
            dimension: description.dimension,
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

/// Pinecone REST client for the control plane (`/indexes`) and an index's
/// data plane (`https://{host}`).
pub struct PineconeHttpClient {
    client: reqwest::Client,
    api_key: String,
    controller_url: String,
}

impl PineconeHttpClient {
    pub fn new(
        api_key: impl Into<String>,
        controller_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(Self::with_client(client, api_key, controller_url))
    }

    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        controller_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            controller_url: controller_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The underlying HTTP client, shared with [`super::PineconeInference`].
    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn control(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.request(method, format!("{}{}", self.controller_url, path)))
    }

    fn data(&self, index: &IndexHandle, path: &str) -> reqwest::RequestBuilder {
        let base = if index.host.starts_with("http://") || index.host.starts_with("https://") {
            index.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", index.host.trim_end_matches('/'))
        };
        self.authorized(self.client.post(format!("{}{}", base, path)))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }
}

#[async_trait]
impl IndexService for PineconeHttpClient {
    async fn describe_index(&self, name: &str) -> Result<Option<IndexHandle>, StoreError> {
        let response = self
            .control(reqwest::Method::GET, &format!("/indexes/{}", name))
            .send()
            .await
            .map_err(|e| request_failed("describe_index", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Pinecone index {} does not exist", name);
            return Ok(None);
        }

        let description: IndexDescription =
            parse(check(response, "describe_index").await?, "describe_index").await?;
        Ok(Some(description.into()))
    }

    async fn create_index(&self, name: &str, spec: &IndexSpec) -> Result<IndexHandle, StoreError> {
        let body = json!({
            "name": name,
            "cloud": spec.cloud,
            "region": spec.region,
            "embed": {
                "model": spec.model,
                "field_map": {"text": "chunk_text"}
            }
        });

        let response = self
            .control(reqwest::Method::POST, "/indexes/create-for-model")
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("create_index", e))?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Pinecone index {} already exists", name);
            return self
                .describe_index(name)
                .await?
                .ok_or_else(|| StoreError::not_initialized("Pinecone", name));
        }

        let description: IndexDescription =
            parse(check(response, "create_index").await?, "create_index").await?;
        info!(
            "Created Pinecone index {} in {}/{} with model {}",
            name, spec.cloud, spec.region, spec.model
        );
        Ok(description.into())
    }

    async fn upsert(
        &self,
        index: &IndexHandle,
        vectors: &[VectorRecord],
    ) -> Result<(), StoreError> {
        let response = self
            .data(index, "/vectors/upsert")
            .json(&json!({ "vectors": vectors }))
            .send()
            .await
            .map_err(|e| request_failed("upsert", e))?;
        check(response, "upsert").await?;
        debug!("Upserted {} vectors to Pinecone index {}", vectors.len(), index.name);
        Ok(())
    }

    async fn query(
        &self,
        index: &IndexHandle,
        query: &VectorQuery,
    ) -> Result<Vec<ScoredVector>, StoreError> {
        let response = self
            .data(index, "/query")
            .json(query)
            .send()
            .await
            .map_err(|e| request_failed("query", e))?;
        let parsed: QueryResponse = parse(check(response, "query").await?, "query").await?;
        Ok(parsed.matches)
    }

    async fn delete(&self, index: &IndexHandle, ids: &[String]) -> Result<(), StoreError> {
        let response = self
            .data(index, "/vectors/delete")
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| request_failed("delete", e))?;
        check(response, "delete").await?;
        debug!("Deleted {} ids from Pinecone index {}", ids.len(), index.name);
        Ok(())
    }

    async fn describe_index_stats(&self, index: &IndexHandle) -> Result<IndexStats, StoreError> {
        let response = self
            .data(index, "/describe_index_stats")
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| request_failed("describe_index_stats", e))?;
        parse(check(response, "describe_index_stats").await?, "describe_index_stats").await
    }
}

pub(crate) fn request_failed(action: &str, e: reqwest::Error) -> StoreError {
    let reason = if e.is_timeout() { "timed out" } else { "failed" };
    StoreError::backend(BACKEND, format!("{} request {}: {}", action, reason, e))
}

pub(crate) async fn check(
    response: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("Pinecone {} returned {}: {}", action, status, body);
    Err(StoreError::backend(
        BACKEND,
        format!("{} returned {}: {}", action, status, body),
    ))
}

pub(crate) async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    action: &str,
) -> Result<T, StoreError> {
    response.json().await.map_err(|e| {
        StoreError::backend(BACKEND, format!("failed to parse {} response: {}", action, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts connections and holds them open without ever answering.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_control_plane_timeout_is_backend_error() {
        let url = silent_server().await;
        let client = PineconeHttpClient::new("key", url, Duration::from_millis(100)).unwrap();

        let err = client.describe_index("my-index").await.unwrap_err();

        assert!(err.is_backend());
        assert_eq!(err.backend_name(), Some("pinecone"));
        assert!(err.to_string().contains("timed out"), "{}", err);
    }

    #[tokio::test]
    async fn test_data_plane_timeout_is_backend_error() {
        let url = silent_server().await;
        let client = PineconeHttpClient::new("key", "http://unused", Duration::from_millis(100))
            .unwrap();
        let index = IndexHandle {
            name: "my-index".to_string(),
            host: url,
            dimension: Some(3),
        };

        let err = client.delete(&index, &["a".to_string()]).await.unwrap_err();

        assert!(err.is_backend());
        assert!(err.to_string().contains("timed out"), "{}", err);
    }

    #[tokio::test]
    async fn test_refused_connection_is_backend_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client =
            PineconeHttpClient::new("key", format!("http://{}", addr), Duration::from_secs(5))
                .unwrap();

        let err = client.describe_index("my-index").await.unwrap_err();

        assert!(err.is_backend());
        assert!(err.to_string().contains("describe_index request failed"), "{}", err);
    }
}
