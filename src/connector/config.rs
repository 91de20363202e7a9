use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{StoreConfig, StoreError};

pub const DEFAULT_CONFIG_PATH: &str = "./store_conf.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Field of the secret file holding the Pinecone API key.
pub const API_KEY_FIELD: &str = "pinecone_api_key";

/// Read `path` (a JSON object keyed by backend name) and pick the parameter
/// object for `backend`.
pub fn load_store_config(path: &Path, backend: &str) -> Result<StoreConfig, StoreError> {
    let root = read_json_file(path, "configuration")?;
    let Value::Object(root) = root else {
        return Err(StoreError::config(format!(
            "Configuration file {} must contain a JSON object",
            path.display()
        )));
    };

    let params = root
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(backend))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| {
            StoreError::config(format!(
                "Backend '{}' not found in configuration file {}",
                backend,
                path.display()
            ))
        })?;

    let Value::Object(params) = params else {
        return Err(StoreError::config(format!(
            "Configuration for backend '{}' in {} must be a JSON object",
            backend,
            path.display()
        )));
    };

    debug!("Loaded '{}' configuration from {}", backend, path.display());
    Ok(StoreConfig::new(backend, params).with_source(path))
}

/// Read the Pinecone API key from a `{"pinecone_api_key": "..."}` file.
pub fn load_api_key(path: &Path) -> Result<String, StoreError> {
    let secret = read_json_file(path, "API key")?;
    match secret.get(API_KEY_FIELD).and_then(Value::as_str) {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(StoreError::config(format!(
            "API key file {} has no non-empty '{}' field",
            path.display(),
            API_KEY_FIELD
        ))),
    }
}

fn read_json_file(path: &Path, what: &str) -> Result<Value, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StoreError::config(format!(
            "Cannot read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        StoreError::config(format!(
            "Malformed JSON in {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

/// Parameters of the `chromadb` backend.
///
/// Setting `url` selects a Chroma server; otherwise the collection lives in
/// process and is persisted under `persist_directory` (`null` keeps it in
/// memory only).
#[cfg(feature = "chromadb")]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChromaSettings {
    pub collection_name: String,
    pub persist_directory: Option<PathBuf>,
    pub url: Option<String>,
    pub database: Option<String>,
    pub embedding_dimensions: usize,
    pub timeout_secs: u64,
}

#[cfg(feature = "chromadb")]
impl Default for ChromaSettings {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            persist_directory: Some(PathBuf::from("./chroma_store")),
            url: None,
            database: None,
            embedding_dimensions: 384,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Parameters of the `pinecone` backend.
#[cfg(feature = "pinecone")]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PineconeSettings {
    pub api_key: Option<String>,
    pub key_file: PathBuf,
    pub index_name: String,
    pub embedding_model: String,
    pub cloud: String,
    pub region: String,
    pub index_model: String,
    pub controller_url: String,
    pub embed_batch_size: usize,
    pub embed_concurrency: usize,
    pub timeout_secs: u64,
}

#[cfg(feature = "pinecone")]
impl Default for PineconeSettings {
    fn default() -> Self {
        let spec = super::IndexSpec::default();
        Self {
            api_key: None,
            key_file: PathBuf::from("./pinecone_key.json"),
            index_name: "my-index".to_string(),
            embedding_model: "multilingual-e5-large".to_string(),
            cloud: spec.cloud,
            region: spec.region,
            index_model: spec.model,
            controller_url: super::DEFAULT_CONTROLLER_URL.to_string(),
            embed_batch_size: super::DEFAULT_MAX_BATCH_SIZE,
            embed_concurrency: super::DEFAULT_EMBED_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[cfg(feature = "pinecone")]
impl PineconeSettings {
    /// Inline `api_key` if set, otherwise the key from `key_file`.
    pub fn resolve_api_key(&self) -> Result<String, StoreError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => load_api_key(&self.key_file),
        }
    }

    pub fn index_spec(&self) -> super::IndexSpec {
        super::IndexSpec {
            cloud: self.cloud.clone(),
            region: self.region.clone(),
            model: self.index_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_store_config_picks_backend_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "store_conf.json",
            r#"{"chromadb": {"collection_name": "docs"}, "pinecone": {"index_name": "idx"}}"#,
        );

        let config = load_store_config(&path, "ChromaDB").unwrap();

        assert_eq!(config.backend(), "ChromaDB");
        assert_eq!(config.params().get("collection_name"), Some(&Value::from("docs")));
        assert_eq!(config.source(), Some(path.as_path()));
    }

    #[test]
    fn test_load_store_config_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let malformed = write(&dir, "bad.json", "{not json");
        let no_key = write(&dir, "nokey.json", r#"{"pinecone": {}}"#);
        let not_object = write(&dir, "scalar.json", r#"{"chromadb": 3}"#);

        for path in [&missing, &malformed, &no_key, &not_object] {
            let err = load_store_config(path, "chromadb").unwrap_err();
            assert!(err.is_config(), "{}", err);
            assert!(err.to_string().contains(&path.display().to_string()), "{}", err);
        }
    }

    #[test]
    fn test_load_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "key.json", r#"{"pinecone_api_key": " pk-123 "}"#);
        let empty = write(&dir, "empty.json", r#"{"pinecone_api_key": ""}"#);
        let absent_field = write(&dir, "other.json", r#"{"api_key": "x"}"#);

        assert_eq!(load_api_key(&good).unwrap(), "pk-123");
        assert!(load_api_key(&empty).unwrap_err().is_config());
        assert!(load_api_key(&absent_field).unwrap_err().is_config());
        assert!(load_api_key(&dir.path().join("nope.json")).unwrap_err().is_config());
    }

    #[cfg(feature = "chromadb")]
    #[test]
    fn test_chroma_settings_defaults_and_null_persist_directory() {
        let defaults: ChromaSettings =
            StoreConfig::from_value("chromadb", serde_json::json!({})).settings().unwrap();
        assert_eq!(defaults, ChromaSettings::default());
        assert_eq!(defaults.persist_directory, Some(PathBuf::from("./chroma_store")));

        let in_memory: ChromaSettings = StoreConfig::from_value(
            "chromadb",
            serde_json::json!({"persist_directory": null, "collection_name": "docs"}),
        )
        .settings()
        .unwrap();
        assert_eq!(in_memory.persist_directory, None);
        assert_eq!(in_memory.collection_name, "docs");
    }

    #[cfg(feature = "pinecone")]
    #[test]
    fn test_pinecone_settings_prefer_inline_key() {
        let settings = PineconeSettings {
            api_key: Some("inline".to_string()),
            key_file: PathBuf::from("/nonexistent/key.json"),
            ..PineconeSettings::default()
        };
        assert_eq!(settings.resolve_api_key().unwrap(), "inline");

        let from_file = PineconeSettings {
            api_key: Some("  ".to_string()),
            ..settings
        };
        let err = from_file.resolve_api_key().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/key.json"));
    }
}
