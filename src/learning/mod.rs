//! Metadata Learning System
//!
//! Remembers the values users commit to metadata fields and offers them back
//! as ranked suggestions:
//! - `store`: durable per-field value history and preferences (SQLite)
//! - `ranker`: frequency x recency scoring
//! - `ingestor`: turns accepted edits into store commits
//! - `context`: related-field suggestions and missing-field recommendations
//! - `service`: the façade used by the CLI and HTTP server

pub mod store;
pub mod ranker;
pub mod ingestor;
pub mod context;
pub mod service;

pub use store::{
    FieldHistory, FieldHistoryEntry, HistoryStore, PreferenceStore, SqliteHistoryStore,
    StoreSnapshot,
};
pub use ranker::{LearnedValue, RankingConfig, Suggestion, SuggestionRanker};
pub use ingestor::{EditedFields, IngestReport, LearningIngestor, MetadataDocument};
pub use context::{FieldRecommendation, RecommendationPriority};
pub use service::{DocumentSuggestions, LearningStats, SuggestionService};

use serde::Serialize;

use crate::error::{Result, SuggestError};

/// A metadata field qualified by its section, e.g. `EXIF` / `Artist`.
///
/// Histories are stored under the combined `section.field` key so the same
/// field name in two sections is learned independently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldKey {
    section: String,
    field: String,
}

impl FieldKey {
    /// Build a key, rejecting blank names and dotted section names.
    pub fn new(section: impl Into<String>, field: impl Into<String>) -> Result<Self> {
        let section = section.into();
        let field = field.into();

        if section.trim().is_empty() {
            return Err(SuggestError::validation("section name must not be empty"));
        }
        if section.contains('.') {
            return Err(SuggestError::validation(format!(
                "section name must not contain '.': {}",
                section
            )));
        }
        if field.trim().is_empty() {
            return Err(SuggestError::validation("field name must not be empty"));
        }

        Ok(Self { section, field })
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The key histories are persisted under
    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.section, self.field)
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.field)
    }
}
