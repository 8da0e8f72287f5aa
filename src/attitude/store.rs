//! Key-value store adapter.
//!
//! Records are addressed by `(plugin_key, target_key, partition)`. The plugin key
//! is fixed per store instance, so callers only pass the target (a user or group
//! id) and the [`Partition`]. Values are opaque strings here; decoding happens in
//! the passes.

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::types::Partition;

/// Store-level failure. [`StoreError::is_transient`] drives the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Connection-level and lock contention faults are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            Self::Task(_) => false,
        }
    }
}

/// Result of a delete. A missing key is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// One raw entry returned by [`KvStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub target_key: String,
    pub value: String,
}

/// Async key-value store. Each call is atomic on its own; there are no
/// multi-key transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, target: &str, partition: Partition) -> Result<Option<String>, StoreError>;

    async fn set(&self, target: &str, partition: Partition, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, target: &str, partition: Partition) -> Result<DeleteOutcome, StoreError>;

    /// Every entry in a partition, ordered by target key.
    async fn list(&self, partition: Partition) -> Result<Vec<StoredEntry>, StoreError>;
}

// ── SQLite ───────────────────────────────────────────────────────────────────

/// `plugin_data`-backed store. Statements run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    plugin_key: String,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>, plugin_key: impl Into<String>) -> Self {
        Self {
            conn,
            plugin_key: plugin_key.into(),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let plugin_key = self.plugin_key.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("db lock poisoned: {e}")))?;
            f(&conn, &plugin_key).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, target: &str, partition: Partition) -> Result<Option<String>, StoreError> {
        let target = target.to_string();
        self.with_conn(move |conn, plugin_key| {
            conn.query_row(
                "SELECT data_value FROM plugin_data \
                 WHERE plugin_key = ?1 AND target_key = ?2 AND data_key = ?3",
                params![plugin_key, target, partition.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, target: &str, partition: Partition, value: &str) -> Result<(), StoreError> {
        let target = target.to_string();
        let value = value.to_string();
        self.with_conn(move |conn, plugin_key| {
            conn.execute(
                "INSERT INTO plugin_data (plugin_key, target_key, data_key, data_value, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(plugin_key, target_key, data_key) \
                 DO UPDATE SET data_value = excluded.data_value, updated_at = excluded.updated_at",
                params![
                    plugin_key,
                    target,
                    partition.as_str(),
                    value,
                    chrono::Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, target: &str, partition: Partition) -> Result<DeleteOutcome, StoreError> {
        let target = target.to_string();
        self.with_conn(move |conn, plugin_key| {
            let affected = conn.execute(
                "DELETE FROM plugin_data \
                 WHERE plugin_key = ?1 AND target_key = ?2 AND data_key = ?3",
                params![plugin_key, target, partition.as_str()],
            )?;
            Ok(if affected == 0 {
                DeleteOutcome::NotFound
            } else {
                DeleteOutcome::Deleted
            })
        })
        .await
    }

    async fn list(&self, partition: Partition) -> Result<Vec<StoredEntry>, StoreError> {
        self.with_conn(move |conn, plugin_key| {
            let mut stmt = conn.prepare(
                "SELECT target_key, data_value FROM plugin_data \
                 WHERE plugin_key = ?1 AND data_key = ?2 ORDER BY target_key",
            )?;
            let entries = stmt
                .query_map(params![plugin_key, partition.as_str()], |row| {
                    Ok(StoredEntry {
                        target_key: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Process-local store for tests and dry runs. Counts writes so callers can
/// assert a pass was a no-op.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<(Partition, String), String>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Raw value without going through the async trait.
    pub fn raw(&self, target: &str, partition: Partition) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|map| map.get(&(partition, target.to_string())).cloned())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(Partition, String), String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("memory store poisoned: {e}")))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, target: &str, partition: Partition) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(&(partition, target.to_string())).cloned())
    }

    async fn set(&self, target: &str, partition: Partition, value: &str) -> Result<(), StoreError> {
        self.lock()?
            .insert((partition, target.to_string()), value.to_string());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, target: &str, partition: Partition) -> Result<DeleteOutcome, StoreError> {
        Ok(match self.lock()?.remove(&(partition, target.to_string())) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn list(&self, partition: Partition) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|((p, _), _)| *p == partition)
            .map(|((_, target_key), value)| StoredEntry {
                target_key: target_key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_store() -> SqliteStore {
        let conn = crate::db::open_memory_database().unwrap();
        SqliteStore::new(Arc::new(Mutex::new(conn)), "attitude")
    }

    #[tokio::test]
    async fn sqlite_set_get_overwrite() {
        let store = sqlite_store();
        assert_eq!(store.get("u1", Partition::UserInfo).await.unwrap(), None);

        store.set("u1", Partition::UserInfo, "first").await.unwrap();
        store.set("u1", Partition::UserInfo, "second").await.unwrap();

        assert_eq!(
            store.get("u1", Partition::UserInfo).await.unwrap().as_deref(),
            Some("second")
        );
        // Same target, other partition is independent
        assert_eq!(store.get("u1", Partition::GroupInfo).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_delete_reports_missing_keys() {
        let store = sqlite_store();
        store.set("g1", Partition::GroupInfo, "{}").await.unwrap();

        assert_eq!(
            store.delete("g1", Partition::GroupInfo).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            store.delete("g1", Partition::GroupInfo).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn sqlite_plugin_keys_are_isolated() {
        let conn = Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()));
        let ours = SqliteStore::new(Arc::clone(&conn), "attitude");
        let theirs = SqliteStore::new(conn, "other_plugin");

        theirs.set("u1", Partition::UserInfo, "foreign").await.unwrap();
        assert_eq!(ours.get("u1", Partition::UserInfo).await.unwrap(), None);
        assert!(ours.list(Partition::UserInfo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_list_is_ordered_by_target() {
        let store = sqlite_store();
        store.set("b", Partition::UserInfo, "2").await.unwrap();
        store.set("a", Partition::UserInfo, "1").await.unwrap();
        store.set("c", Partition::GroupInfo, "3").await.unwrap();

        let entries = store.list(Partition::UserInfo).await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.target_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn memory_store_counts_writes() {
        let store = MemoryStore::new();
        store.set("u1", Partition::UserInfo, "x").await.unwrap();
        store.set("u1", Partition::UserInfo, "y").await.unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.raw("u1", Partition::UserInfo).as_deref(), Some("y"));
        assert_eq!(
            store.delete("nope", Partition::UserInfo).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::Task("panicked".into()).is_transient());
        assert!(!StoreError::Database(rusqlite::Error::QueryReturnedNoRows).is_transient());
    }
}
