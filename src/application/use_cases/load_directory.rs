use std::path::Path;
use std::sync::Arc;

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::{debug, info};

use crate::application::VectorStore;
use crate::domain::{Document, StoreError};

pub const DEFAULT_FILE_PATTERN: &str = "*.txt";

/// Loads the files of one directory (non-recursively) into a store, one
/// document per file keyed by file name.
pub struct LoadDirectoryUseCase {
    store: Arc<dyn VectorStore>,
}

impl LoadDirectoryUseCase {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Returns the number of documents added.
    pub async fn execute(&self, directory: &Path, pattern: &str) -> Result<usize, StoreError> {
        let documents = read_documents(directory, pattern)?;

        if documents.is_empty() {
            info!(
                "No files matching {} found in {}",
                pattern,
                directory.display()
            );
            return Ok(0);
        }

        self.store.add_documents(&documents).await?;
        info!(
            "Loaded {} documents from {}",
            documents.len(),
            directory.display()
        );
        Ok(documents.len())
    }
}

fn read_documents(directory: &Path, pattern: &str) -> Result<Vec<Document>, StoreError> {
    if !directory.is_dir() {
        return Err(StoreError::validation(format!(
            "Not a directory: {}",
            directory.display()
        )));
    }

    let overrides = OverrideBuilder::new(directory)
        .add(pattern)
        .and_then(|builder| builder.build())
        .map_err(|e| StoreError::validation(format!("Invalid file pattern '{}': {}", pattern, e)))?;

    let mut paths = Vec::new();
    for entry in WalkBuilder::new(directory)
        .standard_filters(false)
        .max_depth(Some(1))
        .overrides(overrides)
        .build()
    {
        let entry = entry.map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!("Read {} ({} bytes)", path.display(), content.len());

        documents.push(
            Document::new(filename.clone(), content)
                .with_metadata("filename", filename)
                .with_metadata("source", path.display().to_string())
                .with_metadata("type", "text_file"),
        );
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetadataValue;

    #[test]
    fn test_reads_matching_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "too deep").unwrap();

        let docs = read_documents(dir.path(), DEFAULT_FILE_PATTERN).expect("read");

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(docs[0].text, "first");
        assert_eq!(
            docs[0].metadata.get("type"),
            Some(&MetadataValue::from("text_file"))
        );
        assert_eq!(
            docs[0].metadata.get("filename"),
            Some(&MetadataValue::from("a.txt"))
        );
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let err = read_documents(Path::new("/definitely/not/here"), "*.txt").unwrap_err();
        assert!(err.is_validation());
    }
}
