//! Attitude record and directory entry definitions.
//!
//! [`UserAttitude`] and [`GroupAttitude`] are the persisted shapes. Their JSON
//! encoding is the stored value verbatim. Every field is required on decode;
//! unknown keys are ignored. Directory entries ([`DirectoryUser`],
//! [`DirectoryChannel`]) are read-only inputs from the host's system of record.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Directory id of the reserved system account. Never gets an attitude record.
pub const SENTINEL_USER_ID: i64 = 1;

/// Channel type whose channels carry a group attitude record.
pub const GROUP_CHANNEL_TYPE: &str = "group";

/// Logical store namespace a record lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    UserInfo,
    GroupInfo,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInfo => "user_info",
            Self::GroupInfo => "group_info",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by both record shapes, so the passes are written once.
pub trait AttitudeRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Partition every record of this shape is stored under.
    const PARTITION: Partition;
    /// Human label used in logs (`user`, `group`).
    const KIND: &'static str;

    /// Store key: `user_id` or `group_id`.
    fn key(&self) -> &str;

    /// Copy operator-owned fields from `stored`, leaving directory-owned ones alone.
    fn adopt_operator_fields(&mut self, stored: &Self);

    /// `true` when any directory-owned field differs.
    fn directory_fields_differ(&self, other: &Self) -> bool;
}

/// Identifies one stored record in pass reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub partition: Partition,
    pub key: String,
}

impl EntityRef {
    pub fn new(partition: Partition, key: impl Into<String>) -> Self {
        Self {
            partition,
            key: key.into(),
        }
    }

    pub fn of<R: AttitudeRecord>(record: &R) -> Self {
        Self::new(R::PARTITION, record.key())
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition, self.key)
    }
}

/// Attitude toward a single user, stored under `user_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttitude {
    /// Directory-assigned numeric id.
    pub id: i64,
    /// Stable platform user id; the record's key.
    pub user_id: String,
    /// Mirrors the directory.
    pub username: String,
    /// How the agent addresses this user.
    pub nickname: String,
    pub attitude: String,
    pub relationship: String,
    /// Free-text notes, injected verbatim into prompts.
    pub other: String,
}

impl UserAttitude {
    /// A fresh record for a directory user with blank operator-owned fields.
    pub fn from_directory(user: &DirectoryUser) -> Self {
        Self {
            id: user.id,
            user_id: user.platform_userid.clone(),
            username: user.username.clone(),
            nickname: String::new(),
            attitude: String::new(),
            relationship: String::new(),
            other: String::new(),
        }
    }
}

impl AttitudeRecord for UserAttitude {
    const PARTITION: Partition = Partition::UserInfo;
    const KIND: &'static str = "user";

    fn key(&self) -> &str {
        &self.user_id
    }

    fn adopt_operator_fields(&mut self, stored: &Self) {
        self.nickname.clone_from(&stored.nickname);
        self.attitude.clone_from(&stored.attitude);
        self.relationship.clone_from(&stored.relationship);
        self.other.clone_from(&stored.other);
    }

    fn directory_fields_differ(&self, other: &Self) -> bool {
        self.id != other.id || self.username != other.username
    }
}

/// Attitude toward a group channel, stored under `group_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAttitude {
    pub id: i64,
    /// Platform channel id; the record's key.
    pub group_id: String,
    pub channel_name: String,
    pub attitude: String,
    pub other: String,
}

impl GroupAttitude {
    pub fn from_directory(channel: &DirectoryChannel) -> Self {
        Self {
            id: channel.id,
            group_id: channel.channel_id.clone(),
            channel_name: channel.channel_name.clone(),
            attitude: String::new(),
            other: String::new(),
        }
    }
}

impl AttitudeRecord for GroupAttitude {
    const PARTITION: Partition = Partition::GroupInfo;
    const KIND: &'static str = "group";

    fn key(&self) -> &str {
        &self.group_id
    }

    fn adopt_operator_fields(&mut self, stored: &Self) {
        self.attitude.clone_from(&stored.attitude);
        self.other.clone_from(&stored.other);
    }

    fn directory_fields_differ(&self, other: &Self) -> bool {
        self.id != other.id || self.channel_name != other.channel_name
    }
}

/// A user as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: i64,
    pub username: String,
    pub platform_userid: String,
}

/// A chat channel as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryChannel {
    pub id: i64,
    /// Platform channel id, e.g. `group_437383440`.
    pub channel_id: String,
    pub channel_name: String,
    pub channel_type: String,
}

impl DirectoryChannel {
    pub fn is_group(&self) -> bool {
        self.channel_type == GROUP_CHANNEL_TYPE
    }
}

/// A host chat key such as `onebot_v11-group_437383440`: adapter, then the
/// platform channel id, joined by the first `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatKey {
    pub adapter: String,
    pub channel_id: String,
}

impl ChatKey {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.split_once('-') {
            Some((adapter, channel_id)) if !adapter.is_empty() && !channel_id.is_empty() => {
                Ok(Self {
                    adapter: adapter.to_string(),
                    channel_id: channel_id.to_string(),
                })
            }
            _ => Err(format!(
                "invalid chat key {raw:?}: expected '<adapter>-<channel_id>'"
            )),
        }
    }
}

impl std::fmt::Display for ChatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.adapter, self.channel_id)
    }
}

/// Point-in-time listing handed to the reconcile, validate, and repair passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub users: Vec<DirectoryUser>,
    pub channels: Vec<DirectoryChannel>,
}

impl DirectorySnapshot {
    /// Eligible entries that share a store key are collapsed to the one with
    /// the lowest directory id, so each key maps to exactly one record.
    pub fn new(users: Vec<DirectoryUser>, channels: Vec<DirectoryChannel>) -> Self {
        Self {
            users: dedup_by_store_key(users, "user", is_eligible_user, user_store_key, |u| u.id),
            channels: dedup_by_store_key(channels, "group", DirectoryChannel::is_group, group_store_key, |c| c.id),
        }
    }

    /// Users that get a record: everyone except the sentinel account.
    pub fn eligible_users(&self) -> impl Iterator<Item = &DirectoryUser> {
        self.users.iter().filter(|u| u.id != SENTINEL_USER_ID)
    }

    /// Channels that get a record: group channels only.
    pub fn eligible_groups(&self) -> impl Iterator<Item = &DirectoryChannel> {
        self.channels.iter().filter(|c| c.is_group())
    }

    pub fn find_user(&self, user_id: &str) -> Option<&DirectoryUser> {
        self.eligible_users().find(|u| u.platform_userid == user_id)
    }

    pub fn find_group(&self, group_id: &str) -> Option<&DirectoryChannel> {
        self.eligible_groups().find(|c| c.channel_id == group_id)
    }
}

fn is_eligible_user(user: &DirectoryUser) -> bool {
    user.id != SENTINEL_USER_ID
}

fn user_store_key(user: &DirectoryUser) -> &str {
    &user.platform_userid
}

fn group_store_key(channel: &DirectoryChannel) -> &str {
    &channel.channel_id
}

/// Keep one eligible entry per store key (lowest id wins). Ineligible entries
/// pass through untouched.
fn dedup_by_store_key<T>(
    entries: Vec<T>,
    kind: &'static str,
    eligible: fn(&T) -> bool,
    key: fn(&T) -> &str,
    id: fn(&T) -> i64,
) -> Vec<T> {
    let mut lowest: HashMap<String, i64> = HashMap::new();
    for entry in entries.iter() {
        if !eligible(entry) {
            continue;
        }
        lowest
            .entry(key(entry).to_string())
            .and_modify(|best| *best = (*best).min(id(entry)))
            .or_insert(id(entry));
    }

    let mut taken = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            if !eligible(entry) {
                return true;
            }
            let keep = lowest.get(key(entry)) == Some(&id(entry)) && taken.insert(key(entry).to_string());
            if !keep {
                tracing::warn!(
                    kind,
                    key = %key(entry),
                    dropped_id = id(entry),
                    "directory lists the same key twice, keeping the lowest id"
                );
            }
            keep
        })
        .collect()
}
