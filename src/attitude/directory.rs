//! Directory source: the host's authoritative user and channel listing.
//!
//! Read-only from this crate's point of view. [`SqliteDirectory`] reads the host
//! tables; [`StaticDirectory`] serves a fixed snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::types::{
    ChatKey, DirectoryChannel, DirectorySnapshot, DirectoryUser, GROUP_CHANNEL_TYPE,
    SENTINEL_USER_ID,
};

/// Sender id the host uses for the agent's own messages.
pub const SELF_SENDER_ID: &str = "-1";

/// A channel plus the start of its current conversation (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: DirectoryChannel,
    pub conversation_start: i64,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Users (minus the sentinel account) and group channels.
    async fn snapshot(&self) -> Result<DirectorySnapshot>;

    /// Look up a channel by full chat key.
    async fn channel(&self, chat_key: &str) -> Result<Option<ChannelInfo>>;

    /// Distinct senders in a chat since `since` (unix seconds), newest first,
    /// considering at most `limit` messages. The agent's own id is excluded.
    async fn recent_senders(&self, chat_key: &str, since: i64, limit: usize) -> Result<Vec<String>>;
}

/// Reads `users`, `chat_channels`, and `chat_messages`.
#[derive(Clone)]
pub struct SqliteDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&conn)
        })
        .await
        .context("directory task failed")?
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn snapshot(&self) -> Result<DirectorySnapshot> {
        self.with_conn(|conn| {
            let users = conn
                .prepare("SELECT id, username, platform_userid FROM users WHERE id != ?1 ORDER BY id")?
                .query_map(params![SENTINEL_USER_ID], |row| {
                    Ok(DirectoryUser {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        platform_userid: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read directory users")?;

            let channels = conn
                .prepare(
                    "SELECT id, channel_id, channel_name, channel_type FROM chat_channels \
                     WHERE channel_type = ?1 ORDER BY id",
                )?
                .query_map(params![GROUP_CHANNEL_TYPE], read_channel)?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read directory channels")?;

            Ok(DirectorySnapshot::new(users, channels))
        })
        .await
    }

    async fn channel(&self, chat_key: &str) -> Result<Option<ChannelInfo>> {
        let chat_key = chat_key.to_string();
        self.with_conn(move |conn| {
            let info = conn
                .query_row(
                    "SELECT id, channel_id, channel_name, channel_type, conversation_start_time \
                     FROM chat_channels WHERE chat_key = ?1",
                    params![chat_key],
                    |row| {
                        Ok(ChannelInfo {
                            channel: read_channel(row)?,
                            conversation_start: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(info)
        })
        .await
    }

    async fn recent_senders(&self, chat_key: &str, since: i64, limit: usize) -> Result<Vec<String>> {
        let chat_key = chat_key.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let senders: Vec<String> = conn
                .prepare(
                    "SELECT sender_id FROM chat_messages \
                     WHERE chat_key = ?1 AND send_timestamp >= ?2 \
                     ORDER BY send_timestamp DESC LIMIT ?3",
                )?
                .query_map(params![chat_key, since, limit], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(dedup_senders(senders))
        })
        .await
    }
}

fn read_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectoryChannel> {
    Ok(DirectoryChannel {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        channel_name: row.get(2)?,
        channel_type: row.get(3)?,
    })
}

/// Keep first occurrence order, drop the agent's own id.
fn dedup_senders(senders: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    senders
        .into_iter()
        .filter(|s| s != SELF_SENDER_ID)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

// ── Static ───────────────────────────────────────────────────────────────────

/// One logged message for [`StaticDirectory`].
#[derive(Debug, Clone)]
pub struct StaticMessage {
    pub chat_key: String,
    pub sender_id: String,
    pub send_timestamp: i64,
}

/// Fixed directory contents. Channel lookups match the chat key's channel id.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    pub snapshot: DirectorySnapshot,
    pub messages: Vec<StaticMessage>,
}

impl StaticDirectory {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        Self {
            snapshot,
            messages: Vec::new(),
        }
    }

    pub fn with_message(mut self, chat_key: &str, sender_id: &str, send_timestamp: i64) -> Self {
        self.messages.push(StaticMessage {
            chat_key: chat_key.to_string(),
            sender_id: sender_id.to_string(),
            send_timestamp,
        });
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn snapshot(&self) -> Result<DirectorySnapshot> {
        Ok(DirectorySnapshot::new(
            self.snapshot.eligible_users().cloned().collect(),
            self.snapshot.eligible_groups().cloned().collect(),
        ))
    }

    async fn channel(&self, chat_key: &str) -> Result<Option<ChannelInfo>> {
        let Ok(key) = ChatKey::parse(chat_key) else {
            return Ok(None);
        };
        Ok(self
            .snapshot
            .channels
            .iter()
            .find(|c| c.channel_id == key.channel_id)
            .map(|c| ChannelInfo {
                channel: c.clone(),
                conversation_start: 0,
            }))
    }

    async fn recent_senders(&self, chat_key: &str, since: i64, limit: usize) -> Result<Vec<String>> {
        let mut messages: Vec<&StaticMessage> = self
            .messages
            .iter()
            .filter(|m| m.chat_key == chat_key && m.send_timestamp >= since)
            .collect();
        messages.sort_by(|a, b| b.send_timestamp.cmp(&a.send_timestamp));
        Ok(dedup_senders(
            messages.into_iter().take(limit).map(|m| m.sender_id.clone()),
        ))
    }
}
