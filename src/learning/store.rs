//! Learning Store - durable per-field value history
//!
//! Every metadata field (keyed `section.field`) owns one row in the
//! `field_history` table holding its serialized history as JSON:
//! `[{"value": ..., "count": ..., "lastUsedAt": ...}, ...]`.
//! Fields whose history becomes empty are deleted rather than stored empty.
//!
//! The same database keeps editor preferences in `user_preferences`, one JSON
//! value per key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SuggestError};

/// One distinct value ever committed for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldHistoryEntry {
    pub value: String,
    /// Number of commits of exactly this value
    pub count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// All values committed for one field. Values are unique (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldHistory {
    entries: Vec<FieldHistoryEntry>,
}

impl FieldHistory {
    pub fn entries(&self) -> &[FieldHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-match lookup
    pub fn get(&self, value: &str) -> Option<&FieldHistoryEntry> {
        self.entries.iter().find(|e| e.value == value)
    }

    /// Record one commit of `value`, returning its new count.
    pub fn record(&mut self, value: &str, now: DateTime<Utc>) -> u64 {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.value == value) {
            entry.count += 1;
            entry.last_used_at = now;
            return entry.count;
        }

        self.entries.push(FieldHistoryEntry {
            value: value.to_string(),
            count: 1,
            last_used_at: now,
        });
        1
    }

    /// Drop entries last used before `cutoff`. Returns how many were removed.
    pub fn retain_since(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.last_used_at >= cutoff);
        before - self.entries.len()
    }

    /// Sum of all counts
    pub fn total_commits(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Most recent use of any value
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.last_used_at).max()
    }
}

/// The entire persisted learning state: storage key -> history
pub type StoreSnapshot = BTreeMap<String, FieldHistory>;

/// Persistence seam for field histories.
///
/// Reads never fail: unavailable or unreadable storage degrades to empty
/// history so suggestions can never block an edit. Writes report
/// `SuggestError::Persistence`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Every stored history, or an empty snapshot if storage is unreadable
    async fn load(&self) -> StoreSnapshot;

    /// History of a single field (empty if none)
    async fn history(&self, field: &str) -> FieldHistory;

    /// Record one use of `value` for `field` at `now`, durably.
    /// Blank values are ignored.
    async fn commit_at(&self, field: &str, value: &str, now: DateTime<Utc>) -> Result<()>;

    /// Delete all learning data
    async fn clear_all(&self) -> Result<()>;

    /// Remove entries last used before `cutoff`; returns entries removed
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Persistence seam for editor preferences (last folder, preferred section...).
/// Reads degrade to `None` like history reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored value for `key`, `None` if unset or unreadable
    async fn preference(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_preference(&self, key: &str, value: &Value) -> Result<()>;
}

/// SQLite-backed history and preference store
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteHistoryStore {
    /// Open (or create) the learning database at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(&path)?;

        // FULL sync: a successful commit must survive a crash right after it
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        Self::init_schema(&conn)?;

        info!("Learning database ready at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Non-durable store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS field_history (
                field TEXT PRIMARY KEY,
                entries TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_field_history_updated ON field_history(updated_at DESC);

            CREATE TABLE IF NOT EXISTS user_preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#)?;
        Ok(())
    }

    /// Database file, if the store is on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a use of `value` for `field` now
    pub async fn commit(&self, field: &str, value: &str) -> Result<()> {
        self.commit_at(field, value, Utc::now()).await
    }

    fn read_field(conn: &Connection, field: &str) -> Result<Option<FieldHistory>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT entries FROM field_history WHERE field = ?1",
                params![field],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn read_all(conn: &Connection) -> Result<StoreSnapshot> {
        let mut stmt = conn.prepare_cached("SELECT field, entries FROM field_history")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = StoreSnapshot::new();
        for row in rows {
            let (field, json) = row?;
            match serde_json::from_str::<FieldHistory>(&json) {
                Ok(history) if !history.is_empty() => {
                    snapshot.insert(field, history);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable history for {}: {}", field, e),
            }
        }

        Ok(snapshot)
    }

    fn read_preference(conn: &Connection, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM user_preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        // Plain text that is not JSON reads back as a string
        Ok(raw.map(|raw| match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(_) => Value::String(raw),
        }))
    }

    fn write_field(
        conn: &Connection,
        field: &str,
        history: &FieldHistory,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if history.is_empty() {
            conn.execute("DELETE FROM field_history WHERE field = ?1", params![field])?;
            return Ok(());
        }

        conn.execute(
            r#"INSERT INTO field_history (field, entries, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(field) DO UPDATE SET
                   entries = excluded.entries,
                   updated_at = excluded.updated_at"#,
            params![field, serde_json::to_string(history)?, now.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn load(&self) -> StoreSnapshot {
        let conn = self.conn.lock().await;
        match Self::read_all(&conn) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Learning data unavailable, continuing without history: {}", e);
                StoreSnapshot::new()
            }
        }
    }

    async fn history(&self, field: &str) -> FieldHistory {
        let conn = self.conn.lock().await;
        match Self::read_field(&conn, field) {
            Ok(history) => history.unwrap_or_default(),
            Err(e) => {
                warn!("History for {} unavailable: {}", field, e);
                FieldHistory::default()
            }
        }
    }

    async fn commit_at(&self, field: &str, value: &str, now: DateTime<Utc>) -> Result<()> {
        if field.trim().is_empty() {
            return Err(SuggestError::validation("field name must not be empty"));
        }
        if value.trim().is_empty() {
            debug!("Ignoring blank value for {}", field);
            return Ok(());
        }

        // The whole read-modify-write runs under the connection lock and
        // inside one transaction, so readers only ever see committed rows.
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let mut history = Self::read_field(&tx, field)?.unwrap_or_default();
        let count = history.record(value, now);
        Self::write_field(&tx, field, &history, now)?;

        tx.commit()?;

        debug!("Learned {} = {:?} (count {})", field, value, count);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM field_history", [])?;
        info!("Cleared learning data ({} fields)", deleted);
        Ok(())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let mut removed = 0;
        for (field, mut history) in Self::read_all(&tx)? {
            let pruned = history.retain_since(cutoff);
            if pruned > 0 {
                removed += pruned;
                Self::write_field(&tx, &field, &history, now)?;
            }
        }

        tx.commit()?;

        info!("Pruned {} learned values last used before {}", removed, cutoff.to_rfc3339());
        Ok(removed)
    }
}

#[async_trait]
impl PreferenceStore for SqliteHistoryStore {
    async fn preference(&self, key: &str) -> Option<Value> {
        let conn = self.conn.lock().await;
        match Self::read_preference(&conn, key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Preference {} unavailable: {}", key, e);
                None
            }
        }
    }

    async fn set_preference(&self, key: &str, value: &Value) -> Result<()> {
        if key.trim().is_empty() {
            return Err(SuggestError::validation("preference key must not be empty"));
        }

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO user_preferences (key, value, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;

        debug!("Saved preference {}", key);
        Ok(())
    }
}
