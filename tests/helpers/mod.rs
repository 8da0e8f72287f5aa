#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rapport::attitude::directory::SqliteDirectory;
use rapport::attitude::manage::AttitudeService;
use rapport::attitude::store::{DeleteOutcome, KvStore, MemoryStore, SqliteStore, StoreError, StoredEntry};
use rapport::attitude::types::{DirectoryChannel, DirectoryUser, Partition};
use rapport::db;
use rapport::retry::RetryPolicy;
use rusqlite::{params, Connection};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

pub fn user(id: i64, username: &str, platform_userid: &str) -> DirectoryUser {
    DirectoryUser {
        id,
        username: username.into(),
        platform_userid: platform_userid.into(),
    }
}

pub fn group(id: i64, channel_name: &str, channel_id: &str) -> DirectoryChannel {
    DirectoryChannel {
        id,
        channel_id: channel_id.into(),
        channel_name: channel_name.into(),
        channel_type: "group".into(),
    }
}

/// Insert directory users into the host `users` table.
pub fn seed_users(conn: &Connection, users: &[DirectoryUser]) {
    for u in users {
        conn.execute(
            "INSERT INTO users (id, username, platform_userid) VALUES (?1, ?2, ?3)",
            params![u.id, u.username, u.platform_userid],
        )
        .unwrap();
    }
}

/// Insert a channel under chat key `<adapter>-<channel_id>`.
pub fn seed_channel(conn: &Connection, adapter: &str, channel: &DirectoryChannel) {
    conn.execute(
        "INSERT INTO chat_channels (id, chat_key, channel_id, channel_name, channel_type) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            channel.id,
            format!("{adapter}-{}", channel.channel_id),
            channel.channel_id,
            channel.channel_name,
            channel.channel_type
        ],
    )
    .unwrap();
}

/// Service over a SQLite database, with the store and directory sharing one connection.
pub fn sqlite_service(conn: Connection) -> (AttitudeService, Arc<Mutex<Connection>>) {
    let conn = Arc::new(Mutex::new(conn));
    let service = AttitudeService::new(
        Arc::new(SqliteStore::new(Arc::clone(&conn), "attitude")),
        Arc::new(SqliteDirectory::new(Arc::clone(&conn))),
        RetryPolicy::none(),
    );
    (service, conn)
}

/// A [`MemoryStore`] that fails chosen operations.
///
/// - `fail_writes_for` / `fail_reads_for`: every `set` / `get` on that key fails
/// - `fail_next`: the next `n` calls of any kind fail, then the store recovers
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    broken_writes: Mutex<HashSet<String>>,
    broken_reads: Mutex<HashSet<String>>,
    pending_failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(&self, key: &str) {
        self.broken_writes.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_reads_for(&self, key: &str) {
        self.broken_reads.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    fn check(&self, key: Option<&str>, broken: &Mutex<HashSet<String>>) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_failures.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected outage".into()));
        }
        if let Some(key) = key {
            if broken.lock().unwrap().contains(key) {
                return Err(StoreError::Unavailable(format!("injected fault for {key}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get(&self, target: &str, partition: Partition) -> Result<Option<String>, StoreError> {
        self.check(Some(target), &self.broken_reads)?;
        self.inner.get(target, partition).await
    }

    async fn set(&self, target: &str, partition: Partition, value: &str) -> Result<(), StoreError> {
        self.check(Some(target), &self.broken_writes)?;
        self.inner.set(target, partition, value).await
    }

    async fn delete(&self, target: &str, partition: Partition) -> Result<DeleteOutcome, StoreError> {
        self.check(Some(target), &self.broken_writes)?;
        self.inner.delete(target, partition).await
    }

    async fn list(&self, partition: Partition) -> Result<Vec<StoredEntry>, StoreError> {
        self.check(None, &self.broken_reads)?;
        self.inner.list(partition).await
    }
}
