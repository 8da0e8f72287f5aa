//! Record operations used by the tool, API, and CLI adapters.
//!
//! Updates touch only operator-owned fields and create the record on demand,
//! seeding directory-owned fields from the directory when it knows the entity.
//! Inputs are checked before any store call. Store calls go through the
//! configured [`RetryPolicy`].

use std::sync::Arc;

use serde::Deserialize;

use super::directory::Directory;
use super::error::AttitudeError;
use super::startup::{run_startup, StartupReport};
use super::store::{DeleteOutcome, KvStore};
use super::types::{
    AttitudeRecord, DirectoryChannel, DirectoryUser, GroupAttitude, UserAttitude,
};
use super::{decode, load, save};
use crate::retry::RetryPolicy;

pub const MAX_KEY_CHARS: usize = 100;
pub const MAX_NICKNAME_CHARS: usize = 100;
pub const MAX_ATTITUDE_CHARS: usize = 200;
pub const MAX_RELATIONSHIP_CHARS: usize = 100;
pub const MAX_OTHER_CHARS: usize = 500;

/// Partial update for a user record. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub nickname: Option<String>,
    pub attitude: Option<String>,
    pub relationship: Option<String>,
    pub other: Option<String>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), AttitudeError> {
        check_len("nickname", self.nickname.as_deref(), MAX_NICKNAME_CHARS)?;
        check_len("attitude", self.attitude.as_deref(), MAX_ATTITUDE_CHARS)?;
        check_len("relationship", self.relationship.as_deref(), MAX_RELATIONSHIP_CHARS)?;
        check_len("other", self.other.as_deref(), MAX_OTHER_CHARS)
    }

    fn apply(&self, record: &mut UserAttitude) {
        apply_field(&mut record.nickname, &self.nickname);
        apply_field(&mut record.attitude, &self.attitude);
        apply_field(&mut record.relationship, &self.relationship);
        apply_field(&mut record.other, &self.other);
    }
}

/// Partial update for a group record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupPatch {
    pub attitude: Option<String>,
    pub other: Option<String>,
}

impl GroupPatch {
    pub fn validate(&self) -> Result<(), AttitudeError> {
        check_len("attitude", self.attitude.as_deref(), MAX_ATTITUDE_CHARS)?;
        check_len("other", self.other.as_deref(), MAX_OTHER_CHARS)
    }

    fn apply(&self, record: &mut GroupAttitude) {
        apply_field(&mut record.attitude, &self.attitude);
        apply_field(&mut record.other, &self.other);
    }
}

fn apply_field(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        target.clone_from(v);
    }
}

/// Lengths are counted in characters, not bytes.
fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), AttitudeError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AttitudeError::InvalidInput(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Store keys must be non-empty and bounded.
pub fn validate_key(kind: &str, key: &str) -> Result<(), AttitudeError> {
    if key.trim().is_empty() {
        return Err(AttitudeError::InvalidInput(format!("{kind} key must not be empty")));
    }
    if key.chars().count() > MAX_KEY_CHARS {
        return Err(AttitudeError::InvalidInput(format!(
            "{kind} key must be at most {MAX_KEY_CHARS} characters"
        )));
    }
    Ok(())
}

/// Store, directory, and retry policy bundled for the adapters.
#[derive(Clone)]
pub struct AttitudeService {
    store: Arc<dyn KvStore>,
    directory: Arc<dyn Directory>,
    retry: RetryPolicy,
}

impl AttitudeService {
    pub fn new(store: Arc<dyn KvStore>, directory: Arc<dyn Directory>, retry: RetryPolicy) -> Self {
        Self {
            store,
            directory,
            retry,
        }
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Reconcile, validate, and repair. See [`run_startup`].
    pub async fn startup(&self) -> anyhow::Result<StartupReport> {
        run_startup(self.directory(), self.store()).await
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Apply `patch` to a user's record, creating it if absent.
    pub async fn update_user(&self, user_key: &str, patch: &UserPatch) -> Result<UserAttitude, AttitudeError> {
        validate_key("user", user_key)?;
        patch.validate()?;
        tracing::info!(
            user_key = %user_key,
            attitude = ?patch.attitude,
            relationship = ?patch.relationship,
            "updating user attitude"
        );

        let record = self
            .retry
            .run("update_user_attitude", AttitudeError::is_transient, || {
                self.update_user_once(user_key, patch)
            })
            .await?;

        tracing::info!(user_key = %user_key, "user attitude updated");
        Ok(record)
    }

    async fn update_user_once(&self, user_key: &str, patch: &UserPatch) -> Result<UserAttitude, AttitudeError> {
        let mut record = match load::<UserAttitude>(self.store(), user_key).await? {
            Some(record) => record,
            None => {
                tracing::warn!(user_key = %user_key, "no user record yet, creating one");
                self.seed_user(user_key).await
            }
        };
        patch.apply(&mut record);
        save(self.store(), &record).await?;
        Ok(record)
    }

    async fn seed_user(&self, user_key: &str) -> UserAttitude {
        let known = match self.directory.snapshot().await {
            Ok(snapshot) => snapshot.find_user(user_key).cloned(),
            Err(e) => {
                tracing::warn!(error = %e, "directory unavailable, seeding user record with placeholders");
                None
            }
        };
        let entry = known.unwrap_or_else(|| DirectoryUser {
            id: 0,
            username: String::new(),
            platform_userid: user_key.to_string(),
        });
        UserAttitude::from_directory(&entry)
    }

    pub async fn get_user(&self, user_key: &str) -> Result<Option<UserAttitude>, AttitudeError> {
        validate_key("user", user_key)?;
        self.get(user_key).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserAttitude>, AttitudeError> {
        self.list().await
    }

    pub async fn delete_user(&self, user_key: &str) -> Result<DeleteOutcome, AttitudeError> {
        validate_key("user", user_key)?;
        self.delete::<UserAttitude>(user_key).await
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    /// Apply `patch` to a group's record, creating it if absent.
    pub async fn update_group(&self, group_id: &str, patch: &GroupPatch) -> Result<GroupAttitude, AttitudeError> {
        validate_key("group", group_id)?;
        patch.validate()?;
        tracing::info!(group_id = %group_id, attitude = ?patch.attitude, "updating group attitude");

        let record = self
            .retry
            .run("update_group_attitude", AttitudeError::is_transient, || {
                self.update_group_once(group_id, patch)
            })
            .await?;

        tracing::info!(group_id = %group_id, "group attitude updated");
        Ok(record)
    }

    async fn update_group_once(&self, group_id: &str, patch: &GroupPatch) -> Result<GroupAttitude, AttitudeError> {
        let mut record = match load::<GroupAttitude>(self.store(), group_id).await? {
            Some(record) => record,
            None => {
                tracing::warn!(group_id = %group_id, "no group record yet, creating one");
                self.seed_group(group_id).await
            }
        };
        patch.apply(&mut record);
        save(self.store(), &record).await?;
        Ok(record)
    }

    async fn seed_group(&self, group_id: &str) -> GroupAttitude {
        let known = match self.directory.snapshot().await {
            Ok(snapshot) => snapshot.find_group(group_id).cloned(),
            Err(e) => {
                tracing::warn!(error = %e, "directory unavailable, seeding group record with placeholders");
                None
            }
        };
        let entry = known.unwrap_or_else(|| DirectoryChannel {
            id: 0,
            channel_id: group_id.to_string(),
            channel_name: String::new(),
            channel_type: super::types::GROUP_CHANNEL_TYPE.to_string(),
        });
        GroupAttitude::from_directory(&entry)
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<GroupAttitude>, AttitudeError> {
        validate_key("group", group_id)?;
        self.get(group_id).await
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupAttitude>, AttitudeError> {
        self.list().await
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<DeleteOutcome, AttitudeError> {
        validate_key("group", group_id)?;
        self.delete::<GroupAttitude>(group_id).await
    }

    // ── Shared ───────────────────────────────────────────────────────────────

    async fn get<R: AttitudeRecord>(&self, key: &str) -> Result<Option<R>, AttitudeError> {
        self.retry
            .run("get_attitude", AttitudeError::is_transient, || load::<R>(self.store(), key))
            .await
    }

    /// Every decodable record in the partition. Malformed entries are logged
    /// and left out.
    async fn list<R: AttitudeRecord>(&self) -> Result<Vec<R>, AttitudeError> {
        let entries = self
            .retry
            .run("list_attitudes", AttitudeError::is_transient, || async move {
                self.store().list(R::PARTITION).await.map_err(AttitudeError::from)
            })
            .await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match decode::<R>(&entry.target_key, &entry.value) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping malformed record in listing"),
            }
        }
        Ok(records)
    }

    async fn delete<R: AttitudeRecord>(&self, key: &str) -> Result<DeleteOutcome, AttitudeError> {
        let outcome = self
            .retry
            .run("delete_attitude", AttitudeError::is_transient, || async move {
                self.store().delete(key, R::PARTITION).await.map_err(AttitudeError::from)
            })
            .await?;
        match outcome {
            DeleteOutcome::Deleted => tracing::info!(kind = R::KIND, key = %key, "attitude record deleted"),
            DeleteOutcome::NotFound => tracing::info!(kind = R::KIND, key = %key, "no attitude record to delete"),
        }
        Ok(outcome)
    }
}
