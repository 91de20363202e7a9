use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of backend families this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    ChromaDb,
    Pinecone,
}

impl BackendKind {
    /// Name used for factory dispatch and configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ChromaDb => "chromadb",
            BackendKind::Pinecone => "pinecone",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::ChromaDb => "ChromaDB",
            BackendKind::Pinecone => "Pinecone",
        }
    }

    /// Case-insensitive exact match on the backend name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chromadb" => Some(BackendKind::ChromaDb),
            "pinecone" => Some(BackendKind::Pinecone),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Initialized,
    NotInitialized,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Initialized => "initialized",
            CollectionStatus::NotInitialized => "not_initialized",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Best-effort snapshot of a collection or index. Not guaranteed to be
/// consistent with concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub backend: BackendKind,
    pub document_count: Option<u64>,
    pub status: CollectionStatus,
    #[serde(default)]
    pub stats: BTreeMap<String, serde_json::Value>,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, backend: BackendKind, status: CollectionStatus) -> Self {
        Self {
            name: name.into(),
            backend,
            document_count: None,
            status,
            stats: BTreeMap::new(),
        }
    }

    pub fn with_document_count(mut self, count: u64) -> Self {
        self.document_count = Some(count);
        self
    }

    pub fn with_stat(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.stats.insert(key.into(), value.into());
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.status == CollectionStatus::Initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse_is_case_insensitive() {
        assert_eq!(BackendKind::parse("ChromaDB"), Some(BackendKind::ChromaDb));
        assert_eq!(BackendKind::parse("PINECONE"), Some(BackendKind::Pinecone));
        assert_eq!(BackendKind::parse("chroma"), None);
        assert_eq!(BackendKind::parse(" pinecone"), None);
    }
}
