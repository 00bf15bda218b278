//! SQLite memory store.
//!
//! Synchronous `rusqlite` behind a mutex. Each public operation opens its own
//! transaction and commits before returning; nothing is retried.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::schema::{SCHEMA, TS_FORMAT};
use crate::error::MemoryError;

pub const DEFAULT_AGENT_TYPE: &str = "default";
pub const DEFAULT_CONTEXT_LIMIT: usize = 10;
pub const DEFAULT_METRIC_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Context at or above this importance survives cleanup regardless of age.
const KEEP_IMPORTANCE: i64 = 3;

type Result<T> = std::result::Result<T, MemoryError>;

// ─────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────

/// A context item to persist for a thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub context_type: String,
    pub content: serde_json::Value,
    pub importance: i64,
}

impl ContextEntry {
    pub fn new(context_type: impl Into<String>, content: serde_json::Value, importance: i64) -> Self {
        Self {
            context_type: context_type.into(),
            content,
            importance,
        }
    }
}

/// A context item as read back, with its creation time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredContext {
    pub context_type: String,
    pub content: serde_json::Value,
    pub importance: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub metric_type: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conversation {
    pub thread_id: String,
    pub user_id: String,
    pub agent_type: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rows removed by [`MemoryStore::cleanup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub contexts_deleted: usize,
    pub metrics_deleted: usize,
}

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.display(), "Memory store opened");
        Self::init(conn)
    }

    /// Private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MemoryError::Poisoned)
    }

    // ─── Context ────────────────────────────────────────────────

    /// Store `entry` for the thread, replacing any earlier entry of the same type.
    ///
    /// Entries of different `context_type`s accumulate side by side.
    pub fn save_context(&self, thread_id: &str, entry: &ContextEntry, agent_type: &str) -> Result<()> {
        self.save_context_at(thread_id, entry, agent_type, Utc::now())
    }

    /// [`save_context`](Self::save_context) with an explicit creation time.
    pub fn save_context_at(
        &self,
        thread_id: &str,
        entry: &ContextEntry,
        agent_type: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let content = serde_json::to_string(&entry.content)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO long_term_context
                (thread_id, agent_type, context_type, content, importance_score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                thread_id,
                agent_type,
                entry.context_type,
                content,
                entry.importance,
                fmt_ts(created_at)
            ],
        )?;
        tx.commit()?;
        debug!(thread_id, context_type = %entry.context_type, "Context saved");
        Ok(())
    }

    /// Most important, then most recent, context for the thread.
    pub fn get_context(&self, thread_id: &str, agent_type: &str, limit: usize) -> Result<Vec<StoredContext>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let rows = {
            let mut stmt = tx.prepare(
                "SELECT context_type, content, importance_score, created_at
                 FROM long_term_context
                 WHERE thread_id = ?1 AND agent_type = ?2
                 ORDER BY importance_score DESC, created_at DESC, id DESC
                 LIMIT ?3",
            )?;
            let mapped = stmt.query_map(params![thread_id, agent_type, limit_param(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;

        rows.into_iter()
            .map(|(context_type, content, importance, created_at)| -> Result<StoredContext> {
                Ok(StoredContext {
                    context_type,
                    content: serde_json::from_str(&content)?,
                    importance,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    /// Number of context entries stored for the thread.
    pub fn count_context(&self, thread_id: &str, agent_type: &str) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM long_term_context WHERE thread_id = ?1 AND agent_type = ?2",
            params![thread_id, agent_type],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    // ─── Preferences ────────────────────────────────────────────

    pub fn save_preference(&self, user_id: &str, key: &str, value: &str, agent_type: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO user_preferences
                (user_id, agent_type, preference_key, preference_value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, agent_type, key, value, fmt_ts(Utc::now())],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_preferences(&self, user_id: &str, agent_type: &str) -> Result<BTreeMap<String, String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let prefs = {
            let mut stmt = tx.prepare(
                "SELECT preference_key, preference_value
                 FROM user_preferences
                 WHERE user_id = ?1 AND agent_type = ?2",
            )?;
            let mapped = stmt.query_map(params![user_id, agent_type], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            mapped.collect::<rusqlite::Result<BTreeMap<_, _>>>()?
        };
        tx.commit()?;
        Ok(prefs)
    }

    // ─── Sessions & conversations ───────────────────────────────

    /// Record a new agent session for the thread. Returns the session id.
    pub fn register_session(&self, thread_id: &str, user_id: &str, agent_type: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = fmt_ts(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO agent_sessions
                (session_id, agent_type, user_id, thread_id, status, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
            params![session_id, agent_type, user_id, thread_id, now],
        )?;
        tx.commit()?;
        Ok(session_id)
    }

    /// Touch `last_activity` on the thread's sessions. Returns rows updated.
    pub fn update_session_activity(&self, thread_id: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let n = tx.execute(
            "UPDATE agent_sessions SET last_activity = ?1 WHERE thread_id = ?2",
            params![fmt_ts(Utc::now()), thread_id],
        )?;
        tx.commit()?;
        Ok(n)
    }

    /// Latest activity recorded for the thread, if it ever had a session.
    pub fn get_session_activity(&self, thread_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn.query_row(
            "SELECT MAX(last_activity) FROM agent_sessions WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        raw.as_deref().map(parse_ts).transpose()
    }

    /// Create the conversation row, or bump `updated_at` if it exists.
    ///
    /// The title is only written on creation.
    pub fn ensure_conversation(
        &self,
        thread_id: &str,
        user_id: &str,
        agent_type: &str,
        title: &str,
    ) -> Result<()> {
        let now = fmt_ts(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO conversations
                (thread_id, user_id, agent_type, title, created_at, updated_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, '{}')
             ON CONFLICT(thread_id) DO UPDATE SET updated_at = excluded.updated_at",
            params![thread_id, user_id, agent_type, title, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_conversation(&self, thread_id: &str) -> Result<Option<Conversation>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT thread_id, user_id, agent_type, title, created_at, updated_at
                 FROM conversations WHERE thread_id = ?1",
                params![thread_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(thread_id, user_id, agent_type, title, created, updated)| -> Result<Conversation> {
            Ok(Conversation {
                thread_id,
                user_id,
                agent_type,
                title,
                created_at: parse_ts(&created)?,
                updated_at: parse_ts(&updated)?,
            })
        })
        .transpose()
    }

    // ─── Metrics ────────────────────────────────────────────────

    pub fn save_metric(&self, agent_type: &str, user_id: &str, metric_type: &str, value: f64) -> Result<()> {
        self.save_metric_at(agent_type, user_id, metric_type, value, Utc::now())
    }

    /// [`save_metric`](Self::save_metric) with an explicit timestamp.
    pub fn save_metric_at(
        &self,
        agent_type: &str,
        user_id: &str,
        metric_type: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO performance_metrics (agent_type, user_id, metric_type, metric_value, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![agent_type, user_id, metric_type, value, fmt_ts(timestamp)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Metrics from the trailing `days`, newest first.
    pub fn get_metrics(&self, agent_type: &str, user_id: &str, days: i64) -> Result<Vec<Metric>> {
        let cutoff = fmt_ts(window_start(days)?);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let rows = {
            let mut stmt = tx.prepare(
                "SELECT metric_type, metric_value, timestamp
                 FROM performance_metrics
                 WHERE agent_type = ?1 AND user_id = ?2 AND timestamp >= ?3
                 ORDER BY timestamp DESC, id DESC",
            )?;
            let mapped = stmt.query_map(params![agent_type, user_id, cutoff], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;

        rows.into_iter()
            .map(|(metric_type, value, ts)| -> Result<Metric> {
                Ok(Metric {
                    metric_type,
                    value,
                    timestamp: parse_ts(&ts)?,
                })
            })
            .collect()
    }

    // ─── Retention ──────────────────────────────────────────────

    /// Purge low-importance context and all metrics older than `days`.
    pub fn cleanup(&self, days: i64) -> Result<CleanupReport> {
        let cutoff = fmt_ts(window_start(days)?);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let contexts_deleted = tx.execute(
            "DELETE FROM long_term_context WHERE created_at < ?1 AND importance_score < ?2",
            params![cutoff, KEEP_IMPORTANCE],
        )?;
        let metrics_deleted = tx.execute(
            "DELETE FROM performance_metrics WHERE timestamp < ?1",
            params![cutoff],
        )?;
        tx.commit()?;

        info!(days, contexts_deleted, metrics_deleted, "Memory cleanup finished");
        Ok(CleanupReport {
            contexts_deleted,
            metrics_deleted,
        })
    }
}

/// Start of a trailing window of `days`. Negative or out-of-range spans are rejected.
fn window_start(days: i64) -> Result<DateTime<Utc>> {
    if days < 0 {
        return Err(MemoryError::InvalidWindow(days));
    }
    Duration::try_days(days)
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .ok_or(MemoryError::InvalidWindow(days))
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| MemoryError::Timestamp(raw.to_string()))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_context_round_trip() {
        let store = store();
        let content = json!({"prompt": "crie um serializer", "response": "ok", "n": [1, 2]});
        store
            .save_context("dev_u1", &ContextEntry::new("backend", content.clone(), 2), "dev")
            .unwrap();

        let items = store.get_context("dev_u1", "dev", 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].context_type, "backend");
        assert_eq!(items[0].content, content);
        assert_eq!(items[0].importance, 2);
    }

    #[test]
    fn test_context_same_type_replaces() {
        let store = store();
        store
            .save_context("t", &ContextEntry::new("debug", json!("first"), 1), "dev")
            .unwrap();
        store
            .save_context("t", &ContextEntry::new("debug", json!("second"), 2), "dev")
            .unwrap();

        let items = store.get_context("t", "dev", 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, json!("second"));
        assert_eq!(store.count_context("t", "dev").unwrap(), 1);
    }

    #[test]
    fn test_context_ordered_by_importance() {
        let store = store();
        for (ty, importance) in [("a", 1), ("b", 3), ("c", 2)] {
            store
                .save_context("t", &ContextEntry::new(ty, json!(ty), importance), "dev")
                .unwrap();
        }

        let order: Vec<i64> = store
            .get_context("t", "dev", 10)
            .unwrap()
            .iter()
            .map(|c| c.importance)
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_context_recency_breaks_ties_and_limit_applies() {
        let store = store();
        let now = Utc::now();
        store
            .save_context_at("t", &ContextEntry::new("old", json!(1), 1), "dev", now - Duration::hours(2))
            .unwrap();
        store
            .save_context_at("t", &ContextEntry::new("new", json!(2), 1), "dev", now)
            .unwrap();
        store
            .save_context_at("t", &ContextEntry::new("mid", json!(3), 1), "dev", now - Duration::hours(1))
            .unwrap();

        let items = store.get_context("t", "dev", 2).unwrap();
        let types: Vec<&str> = items.iter().map(|c| c.context_type.as_str()).collect();
        assert_eq!(types, vec!["new", "mid"]);
    }

    #[test]
    fn test_context_scoped_by_agent_type() {
        let store = store();
        store
            .save_context("t", &ContextEntry::new("geral", json!("x"), 1), "binance")
            .unwrap();
        assert!(store.get_context("t", "bet365", 10).unwrap().is_empty());
        assert!(store.get_context("t", DEFAULT_AGENT_TYPE, 10).unwrap().is_empty());
    }

    #[test]
    fn test_preferences_latest_wins() {
        let store = store();
        store.save_preference("u1", "language", "pt", "dev").unwrap();
        store.save_preference("u1", "language", "en", "dev").unwrap();
        store.save_preference("u1", "style", "terse", "dev").unwrap();
        store.save_preference("u1", "language", "es", "binance").unwrap();

        let prefs = store.get_preferences("u1", "dev").unwrap();
        assert_eq!(prefs.len(), 2);
        assert_eq!(prefs["language"], "en");
        assert_eq!(prefs["style"], "terse");
        assert!(store.get_preferences("u2", "dev").unwrap().is_empty());
    }

    #[test]
    fn test_metrics_window() {
        let store = store();
        let now = Utc::now();
        store
            .save_metric_at("dev", "u1", "response_time_ms", 31.0, now - Duration::days(31))
            .unwrap();
        store
            .save_metric_at("dev", "u1", "response_time_ms", 29.0, now - Duration::days(29))
            .unwrap();
        store.save_metric("dev", "u1", "tools_loaded", 4.0).unwrap();

        let metrics = store.get_metrics("dev", "u1", 30).unwrap();
        let values: Vec<f64> = metrics.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![4.0, 29.0]);
        assert_eq!(metrics[0].metric_type, "tools_loaded");
    }

    #[test]
    fn test_cleanup_respects_importance() {
        let store = store();
        let now = Utc::now();
        store
            .save_context_at("t", &ContextEntry::new("stale", json!(1), 2), "dev", now - Duration::days(91))
            .unwrap();
        store
            .save_context_at("t", &ContextEntry::new("pinned", json!(2), 3), "dev", now - Duration::days(200))
            .unwrap();
        store
            .save_context_at("t", &ContextEntry::new("fresh", json!(3), 1), "dev", now - Duration::days(10))
            .unwrap();
        store
            .save_metric_at("dev", "u1", "response_time_ms", 1.0, now - Duration::days(91))
            .unwrap();
        store.save_metric("dev", "u1", "response_time_ms", 2.0).unwrap();

        let report = store.cleanup(90).unwrap();
        assert_eq!(
            report,
            CleanupReport {
                contexts_deleted: 1,
                metrics_deleted: 1
            }
        );

        let types: Vec<String> = store
            .get_context("t", "dev", 10)
            .unwrap()
            .into_iter()
            .map(|c| c.context_type)
            .collect();
        assert_eq!(types, vec!["pinned", "fresh"]);
        assert_eq!(store.get_metrics("dev", "u1", 365).unwrap().len(), 1);
    }

    #[test]
    fn test_window_out_of_range_is_rejected() {
        let store = store();
        store.save_metric("dev", "u1", "response_time_ms", 1.0).unwrap();

        for days in [-1, 1_000_000_000, i64::MAX] {
            assert!(matches!(
                store.get_metrics("dev", "u1", days),
                Err(MemoryError::InvalidWindow(d)) if d == days
            ));
            assert!(matches!(store.cleanup(days), Err(MemoryError::InvalidWindow(_))));
        }
        assert_eq!(store.get_metrics("dev", "u1", 36_500).unwrap().len(), 1);
    }

    #[test]
    fn test_session_activity() {
        let store = store();
        assert_eq!(store.update_session_activity("dev_u1").unwrap(), 0);
        assert!(store.get_session_activity("dev_u1").unwrap().is_none());

        let id = store.register_session("dev_u1", "u1", "dev").unwrap();
        assert!(!id.is_empty());
        let first = store.get_session_activity("dev_u1").unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.update_session_activity("dev_u1").unwrap(), 1);
        let second = store.get_session_activity("dev_u1").unwrap().unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_conversation_upsert_keeps_title() {
        let store = store();
        store
            .ensure_conversation("dev_u1", "u1", "dev", "crie um model django")
            .unwrap();
        let created = store.get_conversation("dev_u1").unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.ensure_conversation("dev_u1", "u1", "dev", "outro titulo").unwrap();
        let updated = store.get_conversation("dev_u1").unwrap().unwrap();

        assert_eq!(updated.title.as_deref(), Some("crie um model django"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert!(store.get_conversation("missing").unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent_memory.db");
        {
            let store = MemoryStore::open(&path).unwrap();
            store.save_preference("u1", "tz", "America/Sao_Paulo", "dev").unwrap();
        }
        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_preferences("u1", "dev").unwrap()["tz"],
            "America/Sao_Paulo"
        );
    }
}
