//! Learning Ingestor - turns accepted metadata edits into store commits
//!
//! Only scalar text is learned. Nested structures, nulls and binary
//! placeholders emitted by the metadata extraction tool are skipped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::store::HistoryStore;
use super::FieldKey;
use crate::error::Result;

/// Metadata as the editor exchanges it: `section -> { field -> value }`
pub type MetadataDocument = serde_json::Map<String, Value>;

/// Accepted edits keyed by (section, field)
pub type EditedFields = BTreeMap<FieldKey, Value>;

/// Prefixes exiftool uses for values it did not inline
const BINARY_MARKERS: &[&str] = &["(Binary data", "base64:"];

/// Outcome of one ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Fields committed to the store
    pub learned: usize,
    /// Fields ignored (blank or not plain text)
    pub skipped: usize,
}

/// Plain-text form of a metadata value, if it has one worth learning
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            if s.trim().is_empty() || BINARY_MARKERS.iter().any(|m| s.starts_with(m)) {
                None
            } else {
                Some(s.clone())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Flatten a metadata document into edited fields.
/// Sections that are not objects and fields with invalid names are dropped.
pub fn flatten_document(document: &MetadataDocument) -> EditedFields {
    let mut edited = EditedFields::new();

    for (section, fields) in document {
        let Value::Object(fields) = fields else {
            continue;
        };

        for (field, value) in fields {
            match FieldKey::new(section.as_str(), field.as_str()) {
                Ok(key) => {
                    edited.insert(key, value.clone());
                }
                Err(e) => debug!("Ignoring field {}/{}: {}", section, field, e),
            }
        }
    }

    edited
}

pub struct LearningIngestor {
    store: Arc<dyn HistoryStore>,
}

impl LearningIngestor {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Commit every scalar value under its `section.field` key.
    ///
    /// Stops at the first storage failure; fields committed before it stay
    /// committed.
    pub async fn ingest(&self, edited: &EditedFields, now: DateTime<Utc>) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for (key, value) in edited {
            match scalar_text(value) {
                Some(text) => {
                    self.store.commit_at(&key.storage_key(), &text, now).await?;
                    report.learned += 1;
                }
                None => {
                    debug!("Not learning non-text value for {}", key);
                    report.skipped += 1;
                }
            }
        }

        info!("Learned {} fields ({} skipped)", report.learned, report.skipped);
        Ok(report)
    }

    /// Ingest a whole `section -> { field -> value }` document
    pub async fn ingest_document(
        &self,
        document: &MetadataDocument,
        now: DateTime<Utc>,
    ) -> Result<IngestReport> {
        self.ingest(&flatten_document(document), now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::store::SqliteHistoryStore;
    use serde_json::json;

    fn document(value: Value) -> MetadataDocument {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!("Jane")), Some("Jane".to_string()));
        assert_eq!(scalar_text(&json!(2.8)), Some("2.8".to_string()));
        assert_eq!(scalar_text(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_text(&json!("  ")), None);
        assert_eq!(scalar_text(&json!(null)), None);
        assert_eq!(scalar_text(&json!(["a", "b"])), None);
        assert_eq!(scalar_text(&json!({"x": 1})), None);
        assert_eq!(
            scalar_text(&json!("(Binary data 5120 bytes, use -b option to extract)")),
            None
        );
    }

    #[test]
    fn test_flatten_document_skips_non_object_sections() {
        let doc = document(json!({
            "EXIF": {"Artist": "Jane", "": "nameless"},
            "SourceFile": "/photos/a.jpg",
            "IPTC": {"Keywords": "sunset"}
        }));

        let edited = flatten_document(&doc);
        let keys: Vec<String> = edited.keys().map(|k| k.storage_key()).collect();
        assert_eq!(keys, vec!["EXIF.Artist", "IPTC.Keywords"]);
    }

    #[tokio::test]
    async fn test_sections_are_learned_independently() {
        let store = Arc::new(SqliteHistoryStore::open_in_memory().unwrap());
        let ingestor = LearningIngestor::new(store.clone());

        let doc = document(json!({
            "EXIF": {"Description": "Harbour at dusk"},
            "IPTC": {"Description": "Oslo harbour"}
        }));
        let report = ingestor.ingest_document(&doc, Utc::now()).await.unwrap();
        assert_eq!(report, IngestReport { learned: 2, skipped: 0 });

        let exif = store.history("EXIF.Description").await;
        let iptc = store.history("IPTC.Description").await;
        assert!(exif.get("Harbour at dusk").is_some());
        assert!(exif.get("Oslo harbour").is_none());
        assert!(iptc.get("Oslo harbour").is_some());
    }

    #[tokio::test]
    async fn test_structured_values_create_no_history() {
        let store = Arc::new(SqliteHistoryStore::open_in_memory().unwrap());
        let ingestor = LearningIngestor::new(store.clone());

        let mut edited = EditedFields::new();
        edited.insert(FieldKey::new("XMP", "Subject").unwrap(), json!(["sea", "boat"]));
        edited.insert(FieldKey::new("EXIF", "ThumbnailImage").unwrap(), json!("(Binary data 2048 bytes)"));
        edited.insert(FieldKey::new("EXIF", "GPS").unwrap(), json!({"lat": 59.9}));
        edited.insert(FieldKey::new("EXIF", "Artist").unwrap(), json!(""));

        let report = ingestor.ingest(&edited, Utc::now()).await.unwrap();
        assert_eq!(report, IngestReport { learned: 0, skipped: 4 });
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_reingesting_reinforces() {
        let store = Arc::new(SqliteHistoryStore::open_in_memory().unwrap());
        let ingestor = LearningIngestor::new(store.clone());

        let mut edited = EditedFields::new();
        edited.insert(FieldKey::new("EXIF", "Artist").unwrap(), json!("Jane"));

        ingestor.ingest(&edited, Utc::now()).await.unwrap();
        ingestor.ingest(&edited, Utc::now()).await.unwrap();

        assert_eq!(store.history("EXIF.Artist").await.get("Jane").unwrap().count, 2);
    }
}
