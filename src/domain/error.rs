use thiserror::Error;

/// Boxed cause carried by [`StoreError::Backend`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed caller input. Raised before any backend call is made.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{backend} index '{name}' is not initialized; create it first")]
    NotInitialized { backend: String, name: String },

    #[error(
        "Unsupported backend: '{requested}'. Supported backends: {}",
        .supported.join(", ")
    )]
    UnsupportedBackend {
        requested: String,
        supported: Vec<&'static str>,
    },

    #[error("{backend} backend error: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BoxError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_initialized(backend: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotInitialized {
            backend: backend.into(),
            name: name.into(),
        }
    }

    pub fn unsupported_backend(requested: impl Into<String>, supported: Vec<&'static str>) -> Self {
        Self::UnsupportedBackend {
            requested: requested.into(),
            supported,
        }
    }

    pub fn backend(backend: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Backend {
            backend: backend.into(),
            source: cause.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }

    pub fn is_unsupported_backend(&self) -> bool {
        matches!(self, Self::UnsupportedBackend { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Name of the backend that produced this error, when known.
    pub fn backend_name(&self) -> Option<&str> {
        match self {
            Self::NotInitialized { backend, .. } | Self::Backend { backend, .. } => Some(backend),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_message_lists_supported_set() {
        let err = StoreError::unsupported_backend("faiss", vec!["chromadb", "pinecone"]);
        let msg = err.to_string();

        assert!(msg.contains("'faiss'"));
        assert!(msg.contains("chromadb, pinecone"));
        assert!(err.is_unsupported_backend());
    }

    #[test]
    fn test_backend_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let err = StoreError::backend("pinecone", io);

        assert_eq!(err.backend_name(), Some("pinecone"));
        assert!(err.to_string().contains("deadline elapsed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
