use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::StoreError;

/// Backend name plus its parameter object, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    backend: String,
    params: Map<String, Value>,
    source: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new(backend: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            backend: backend.into(),
            params,
            source: None,
        }
    }

    /// Build from a `serde_json::json!` object literal. Non-objects yield
    /// an empty parameter map.
    pub fn from_value(backend: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(backend, params)
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Deserialize the parameter object into a backend's typed settings.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            StoreError::config(format!(
                "Invalid '{}' configuration{}: {}",
                self.backend,
                self.source_suffix(),
                e
            ))
        })
    }

    fn source_suffix(&self) -> String {
        match &self.source {
            Some(path) => format!(" in {}", path.display()),
            None => String::new(),
        }
    }
}
