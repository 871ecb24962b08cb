//! Suggestion Ranker - orders learned values for auto-complete
//!
//! score = count * recency_weight(now - last_used_at)
//!
//! The weight decays exponentially with a configurable half-life but never
//! drops below `recency_floor`, so a value used many times long ago still
//! outranks one used once yesterday.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use super::store::{FieldHistory, FieldHistoryEntry, HistoryStore};

/// Recency decay tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Days for the decaying part of the weight to halve. `<= 0` disables decay.
    pub half_life_days: f64,
    /// Lower bound of the weight, in `0.0..=1.0`
    pub recency_floor: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            half_life_days: 90.0,
            recency_floor: 0.5,
        }
    }
}

impl RankingConfig {
    /// Weight in `[floor, 1.0]`, non-increasing in `elapsed`.
    pub fn recency_weight(&self, elapsed: Duration) -> f64 {
        if !(self.half_life_days > 0.0 && self.half_life_days.is_finite()) {
            return 1.0;
        }

        let floor = if self.recency_floor.is_finite() {
            self.recency_floor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Timestamps in the future (clock skew) count as "just now"
        let elapsed_days = elapsed.num_seconds().max(0) as f64 / 86_400.0;
        let decay = 0.5f64.powf(elapsed_days / self.half_life_days);

        floor + (1.0 - floor) * decay
    }

    pub fn score(&self, entry: &FieldHistoryEntry, now: DateTime<Utc>) -> f64 {
        entry.count as f64 * self.recency_weight(now - entry.last_used_at)
    }
}

/// A ranked candidate value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub value: String,
    pub count: u64,
}

/// A learned value together with the field it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedValue {
    pub field: String,
    pub value: String,
    pub count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// Rank one field's history. Pure; used by `SuggestionRanker::rank`.
///
/// Ties on score go to the more recently used value, then to the
/// lexicographically smaller one, so output is deterministic.
pub fn rank_history(
    history: &FieldHistory,
    limit: usize,
    now: DateTime<Utc>,
    config: &RankingConfig,
) -> Vec<Suggestion> {
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &FieldHistoryEntry)> = history
        .entries()
        .iter()
        .map(|entry| (config.score(entry, now), entry))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.last_used_at.cmp(&a.last_used_at))
            .then_with(|| a.value.cmp(&b.value))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, entry)| Suggestion {
            value: entry.value.clone(),
            count: entry.count,
        })
        .collect()
}

/// Computes ranked suggestions from the learning store
pub struct SuggestionRanker {
    store: Arc<dyn HistoryStore>,
    config: RankingConfig,
}

impl SuggestionRanker {
    pub fn new(store: Arc<dyn HistoryStore>, config: RankingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Top `limit` values for `field` (a storage key such as `EXIF.Artist`).
    /// `limit == 0` returns immediately without reading the store.
    pub async fn rank(&self, field: &str, limit: usize, now: DateTime<Utc>) -> Vec<Suggestion> {
        if limit == 0 {
            return Vec::new();
        }

        let history = self.store.history(field).await;
        rank_history(&history, limit, now, &self.config)
    }

    /// Most used values across every field
    pub async fn popular(&self, limit: usize) -> Vec<LearnedValue> {
        if limit == 0 {
            return Vec::new();
        }

        let mut values = flatten(self.store.load().await);
        values.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_used_at.cmp(&a.last_used_at))
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.value.cmp(&b.value))
        });
        values.truncate(limit);
        values
    }

    /// Values last used at or after `cutoff`, newest first
    pub async fn recent(&self, cutoff: DateTime<Utc>, limit: usize) -> Vec<LearnedValue> {
        if limit == 0 {
            return Vec::new();
        }

        let mut values: Vec<LearnedValue> = flatten(self.store.load().await)
            .into_iter()
            .filter(|v| v.last_used_at >= cutoff)
            .collect();
        values.sort_by(|a, b| {
            b.last_used_at
                .cmp(&a.last_used_at)
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.value.cmp(&b.value))
        });
        values.truncate(limit);
        values
    }
}

fn flatten(snapshot: super::store::StoreSnapshot) -> Vec<LearnedValue> {
    snapshot
        .into_iter()
        .flat_map(|(field, history)| {
            history
                .entries()
                .iter()
                .map(|entry| LearnedValue {
                    field: field.clone(),
                    value: entry.value.clone(),
                    count: entry.count,
                    last_used_at: entry.last_used_at,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
