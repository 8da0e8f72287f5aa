//! Validation pass: read-only coverage and shape check.
//!
//! For every eligible directory entity the stored record must exist and decode
//! into its full shape. Nothing is written. A read failure marks the entity
//! invalid and the scan continues.

use std::collections::HashSet;

use serde::Serialize;

use super::store::{KvStore, StoreError};
use super::types::{
    AttitudeRecord, DirectorySnapshot, EntityRef, GroupAttitude, Partition, UserAttitude,
};

/// Classification of one stored record.
#[derive(Debug)]
pub enum RecordState<R> {
    Valid(R),
    Missing,
    Malformed { raw: String, error: serde_json::Error },
}

/// Read a record and classify it. Only store faults are errors.
pub async fn inspect<R: AttitudeRecord>(
    store: &dyn KvStore,
    key: &str,
) -> Result<RecordState<R>, StoreError> {
    let Some(raw) = store.get(key, R::PARTITION).await? else {
        return Ok(RecordState::Missing);
    };
    Ok(match serde_json::from_str::<R>(&raw) {
        Ok(record) => RecordState::Valid(record),
        Err(error) => RecordState::Malformed { raw, error },
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub valid: usize,
    /// Directory entities with no stored record.
    pub missing: Vec<EntityRef>,
    /// Stored records that do not decode.
    pub malformed: Vec<EntityRef>,
    /// Entities whose record could not be read.
    pub unreadable: Vec<EntityRef>,
}

impl ValidationReport {
    /// `true` only if every entity has a present, well-formed record.
    pub fn all_valid(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty() && self.unreadable.is_empty()
    }

    pub fn invalid_count(&self) -> usize {
        self.missing.len() + self.malformed.len() + self.unreadable.len()
    }
}

/// Check every eligible directory entity's record.
pub async fn validate_all(snapshot: &DirectorySnapshot, store: &dyn KvStore) -> ValidationReport {
    let mut report = ValidationReport::default();

    for user in snapshot.eligible_users() {
        validate_into::<UserAttitude>(store, &user.platform_userid, &mut report).await;
    }
    for channel in snapshot.eligible_groups() {
        validate_into::<GroupAttitude>(store, &channel.channel_id, &mut report).await;
    }

    if report.all_valid() {
        tracing::info!(checked = report.checked, "all attitude records valid");
    } else {
        tracing::warn!(
            checked = report.checked,
            missing = report.missing.len(),
            malformed = report.malformed.len(),
            unreadable = report.unreadable.len(),
            "attitude records need repair"
        );
    }
    report
}

async fn validate_into<R: AttitudeRecord>(store: &dyn KvStore, key: &str, report: &mut ValidationReport) {
    report.checked += 1;
    let entity = EntityRef::new(R::PARTITION, key);

    match inspect::<R>(store, key).await {
        Ok(RecordState::Valid(_)) => report.valid += 1,
        Ok(RecordState::Missing) => {
            tracing::warn!(kind = R::KIND, key = %key, "coverage gap: directory entity has no stored record");
            report.missing.push(entity);
        }
        Ok(RecordState::Malformed { error, .. }) => {
            tracing::warn!(kind = R::KIND, key = %key, error = %error, "stored record is malformed");
            report.malformed.push(entity);
        }
        Err(e) => {
            tracing::error!(kind = R::KIND, key = %key, error = %e, "failed to read stored record");
            report.unreadable.push(entity);
        }
    }
}

/// Stored records whose key the directory no longer lists. They are kept;
/// this only reports them.
pub async fn find_orphans(
    snapshot: &DirectorySnapshot,
    store: &dyn KvStore,
) -> Result<Vec<EntityRef>, StoreError> {
    let users: HashSet<&str> = snapshot
        .eligible_users()
        .map(|u| u.platform_userid.as_str())
        .collect();
    let groups: HashSet<&str> = snapshot
        .eligible_groups()
        .map(|c| c.channel_id.as_str())
        .collect();

    let mut orphans = Vec::new();
    for (partition, known) in [(Partition::UserInfo, &users), (Partition::GroupInfo, &groups)] {
        for entry in store.list(partition).await? {
            if !known.contains(entry.target_key.as_str()) {
                orphans.push(EntityRef::new(partition, entry.target_key));
            }
        }
    }
    Ok(orphans)
}
