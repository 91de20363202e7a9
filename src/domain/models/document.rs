use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::StoreError;

/// Scalar metadata value. Untagged so it serializes as a plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Convert a JSON value coming back from a backend. Non-scalar values
    /// (lists, objects) are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Float),
            },
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            other => Some(Self::Str(other.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Convert backend JSON metadata into [`Metadata`], dropping nulls.
pub fn metadata_from_json(map: &serde_json::Map<String, serde_json::Value>) -> Metadata {
    map.iter()
        .filter_map(|(k, v)| MetadataValue::from_json(v).map(|v| (k.clone(), v)))
        .collect()
}

pub fn metadata_to_json(metadata: &Metadata) -> serde_json::Map<String, serde_json::Value> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// A text document submitted to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Zip parallel `documents`/`ids`/`metadatas` lists into a validated batch.
    ///
    /// Fails with [`StoreError::Validation`] on any length mismatch or empty id.
    /// Duplicate ids collapse last-write-wins, see [`Document::prepare_batch`].
    pub fn batch(
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
    ) -> Result<Vec<Document>, StoreError> {
        if documents.len() != ids.len() {
            return Err(StoreError::validation(format!(
                "Number of documents ({}) must match number of IDs ({})",
                documents.len(),
                ids.len()
            )));
        }

        if let Some(metadatas) = metadatas {
            if metadatas.len() != documents.len() {
                return Err(StoreError::validation(format!(
                    "Number of metadatas ({}) must match number of documents ({})",
                    metadatas.len(),
                    documents.len()
                )));
            }
        }

        let docs = ids
            .iter()
            .zip(documents.iter())
            .enumerate()
            .map(|(i, (id, text))| Document {
                id: id.clone(),
                text: text.clone(),
                metadata: metadatas.map(|m| m[i].clone()).unwrap_or_default(),
            })
            .collect();

        Self::prepare_batch(docs)
    }

    /// Reject empty ids and collapse duplicates.
    ///
    /// The final occurrence of an id wins and takes the slot of the first one,
    /// so the resulting order only depends on the input order.
    pub fn prepare_batch(docs: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(docs.len());
        let mut batch: Vec<Document> = Vec::with_capacity(docs.len());

        for doc in docs {
            if doc.id.trim().is_empty() {
                return Err(StoreError::validation("Document IDs must not be empty"));
            }
            match positions.get(&doc.id) {
                Some(&slot) => batch[slot] = doc,
                None => {
                    positions.insert(doc.id.clone(), batch.len());
                    batch.push(doc);
                }
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_batch_rejects_id_count_mismatch() {
        let err = Document::batch(&strings(&["a", "b"]), &strings(&["1"]), None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_batch_rejects_metadata_count_mismatch() {
        let metadatas = vec![Metadata::new()];
        let err = Document::batch(
            &strings(&["a", "b"]),
            &strings(&["1", "2"]),
            Some(&metadatas),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_batch_rejects_empty_id() {
        let err = Document::batch(&strings(&["a"]), &strings(&[" "]), None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_duplicate_ids_last_write_wins_in_first_slot() {
        let batch = Document::batch(
            &strings(&["first", "other", "second"]),
            &strings(&["x", "y", "x"]),
            None,
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, "x");
        assert_eq!(batch[0].text, "second");
        assert_eq!(batch[1].id, "y");
    }

    #[test]
    fn test_metadata_value_json_scalars() {
        let json = serde_json::json!({"n": 3, "f": 0.5, "s": "notion", "b": true, "gone": null});
        let metadata = metadata_from_json(json.as_object().unwrap());

        assert_eq!(metadata.get("n"), Some(&MetadataValue::Int(3)));
        assert_eq!(metadata.get("f"), Some(&MetadataValue::Float(0.5)));
        assert_eq!(metadata.get("s"), Some(&MetadataValue::from("notion")));
        assert_eq!(metadata.get("b"), Some(&MetadataValue::Bool(true)));
        assert!(!metadata.contains_key("gone"));
        assert_eq!(
            serde_json::Value::Object(metadata_to_json(&metadata)),
            serde_json::json!({"n": 3, "f": 0.5, "s": "notion", "b": true})
        );
    }
}
