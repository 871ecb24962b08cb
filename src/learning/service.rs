//! Suggestion Service - the façade the editor talks to
//!
//! Validates caller input, combines section and field into the storage key
//! and delegates to the ranker, ingestor and store. It keeps no state of its
//! own; everything lives in the injected `HistoryStore`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::context::{self, FieldRecommendation};
use super::ingestor::{self, IngestReport, LearningIngestor, MetadataDocument};
use super::ranker::{LearnedValue, RankingConfig, Suggestion, SuggestionRanker};
use super::store::{HistoryStore, PreferenceStore, SqliteHistoryStore};
use super::FieldKey;
use crate::error::{Result, SuggestError};

/// Default number of suggestions per field
pub const DEFAULT_LIMIT: usize = 5;

/// Related-field suggestions are capped lower than a field's own
const RELATED_LIMIT: usize = 3;

/// Ranked suggestions per `section.field`
pub type DocumentSuggestions = BTreeMap<String, Vec<Suggestion>>;

/// Size of the learned history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub fields: usize,
    pub values: usize,
    pub total_commits: u64,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SuggestionService {
    store: Arc<dyn HistoryStore>,
    preferences: Arc<dyn PreferenceStore>,
    ranker: Arc<SuggestionRanker>,
    ingestor: Arc<LearningIngestor>,
}

fn validate_limit(limit: i64) -> Result<usize> {
    usize::try_from(limit)
        .map_err(|_| SuggestError::validation(format!("limit must be >= 0, got {}", limit)))
}

fn validate_preference_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SuggestError::validation("preference key must not be empty"));
    }
    Ok(())
}

/// Start of the `days`-long window ending at `now`. A window reaching past
/// the earliest representable instant covers all of history.
fn window_start(days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if days < 0 {
        return Err(SuggestError::validation(format!("days must be >= 0, got {}", days)));
    }
    Ok(Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC))
}

impl SuggestionService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: RankingConfig,
    ) -> Self {
        Self {
            ranker: Arc::new(SuggestionRanker::new(store.clone(), config)),
            ingestor: Arc::new(LearningIngestor::new(store.clone())),
            store,
            preferences,
        }
    }

    /// Service over the SQLite learning database at `path`
    pub async fn open<P: AsRef<std::path::Path>>(path: P, config: RankingConfig) -> Result<Self> {
        let store = Arc::new(SqliteHistoryStore::open(path).await?);
        Ok(Self::new(store.clone(), store, config))
    }

    pub fn ranking_config(&self) -> &RankingConfig {
        self.ranker.config()
    }

    /// Ranked suggestions for one field
    pub async fn get_suggestions(&self, section: &str, field: &str, limit: i64) -> Result<Vec<Suggestion>> {
        self.get_suggestions_at(section, field, limit, Utc::now()).await
    }

    /// Same as `get_suggestions`, ranked as of `now`
    pub async fn get_suggestions_at(
        &self,
        section: &str,
        field: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Suggestion>> {
        let key = FieldKey::new(section, field)?;
        let limit = validate_limit(limit)?;
        Ok(self.ranker.rank(&key.storage_key(), limit, now).await)
    }

    /// Learn the final value of one field after a save
    pub async fn record_accepted_edit(&self, section: &str, field: &str, value: &str) -> Result<()> {
        self.record_accepted_edit_at(section, field, value, Utc::now()).await
    }

    pub async fn record_accepted_edit_at(
        &self,
        section: &str,
        field: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = FieldKey::new(section, field)?;
        self.store.commit_at(&key.storage_key(), value, now).await
    }

    /// Learn every scalar field of a saved metadata document
    pub async fn record_document(&self, document: &MetadataDocument) -> Result<IngestReport> {
        self.ingestor.ingest_document(document, Utc::now()).await
    }

    /// Suggestions for every filled field of `document`, plus related fields
    /// the document is missing (e.g. a camera model when only the make is set).
    /// Fields without history are left out.
    pub async fn suggest_for_document(
        &self,
        document: &MetadataDocument,
        limit: i64,
    ) -> Result<DocumentSuggestions> {
        self.suggest_for_document_at(document, limit, Utc::now()).await
    }

    pub async fn suggest_for_document_at(
        &self,
        document: &MetadataDocument,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<DocumentSuggestions> {
        let limit = validate_limit(limit)?;
        let mut suggestions = DocumentSuggestions::new();
        if limit == 0 {
            return Ok(suggestions);
        }

        for (key, value) in ingestor::flatten_document(document) {
            if ingestor::scalar_text(&value).is_none() {
                continue;
            }
            let storage_key = key.storage_key();
            let ranked = self.ranker.rank(&storage_key, limit, now).await;
            if !ranked.is_empty() {
                suggestions.insert(storage_key, ranked);
            }
        }

        for key in context::related_targets(document) {
            let storage_key = key.storage_key();
            let ranked = self.ranker.rank(&storage_key, limit.min(RELATED_LIMIT), now).await;
            if !ranked.is_empty() {
                suggestions.insert(storage_key, ranked);
            }
        }

        Ok(suggestions)
    }

    /// Common fields missing from `document`
    pub fn recommend_fields(&self, document: &MetadataDocument) -> Vec<FieldRecommendation> {
        context::recommend_fields(document)
    }

    /// Forget everything learned so far
    pub async fn clear_learning_data(&self) -> Result<()> {
        self.store.clear_all().await
    }

    /// Most used values across all fields
    pub async fn popular_values(&self, limit: i64) -> Result<Vec<LearnedValue>> {
        let limit = validate_limit(limit)?;
        Ok(self.ranker.popular(limit).await)
    }

    /// Values used during the last `days` days, newest first
    pub async fn recent_values(&self, days: i64, limit: i64) -> Result<Vec<LearnedValue>> {
        let cutoff = window_start(days, Utc::now())?;
        let limit = validate_limit(limit)?;
        Ok(self.ranker.recent(cutoff, limit).await)
    }

    /// Drop values not used during the last `days` days
    pub async fn prune_stale(&self, days: i64) -> Result<usize> {
        let cutoff = window_start(days, Utc::now())?;
        let removed = self.store.prune_before(cutoff).await?;
        info!("Retention cleanup removed {} values older than {} days", removed, days);
        Ok(removed)
    }

    /// Remember an editor preference. Learning data clears leave these alone.
    pub async fn save_user_preference(&self, key: &str, value: &Value) -> Result<()> {
        validate_preference_key(key)?;
        self.preferences.set_preference(key, value).await
    }

    /// Stored preference, or `None` if it was never saved
    pub async fn get_user_preference(&self, key: &str) -> Result<Option<Value>> {
        validate_preference_key(key)?;
        Ok(self.preferences.preference(key).await)
    }

    pub async fn stats(&self) -> LearningStats {
        let snapshot = self.store.load().await;
        LearningStats {
            fields: snapshot.len(),
            values: snapshot.values().map(|h| h.len()).sum(),
            total_commits: snapshot.values().map(|h| h.total_commits()).sum(),
            newest: snapshot.values().filter_map(|h| h.last_used_at()).max(),
        }
    }
}
