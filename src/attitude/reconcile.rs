//! Reconciliation pass: directory → store, one way.
//!
//! Every eligible directory entity ends up with a stored record whose
//! directory-owned fields match the directory. Operator-owned fields already in
//! the store are carried over untouched. A record whose directory-owned fields
//! already match is not rewritten, so a second pass over an unchanged directory
//! performs no writes.

use serde::Serialize;

use super::error::AttitudeError;
use super::store::KvStore;
use super::types::{AttitudeRecord, DirectorySnapshot, EntityRef, GroupAttitude, UserAttitude};
use super::{decode, save};

/// What the pass did for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Per-partition tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<EntityRef>,
}

impl PassCounts {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub users: PassCounts,
    pub groups: PassCounts,
}

impl ReconcileReport {
    pub fn writes(&self) -> usize {
        self.users.writes() + self.groups.writes()
    }

    pub fn failures(&self) -> usize {
        self.users.failed.len() + self.groups.failed.len()
    }
}

/// Run one reconciliation pass. Never fails as a whole: a fault on one entity
/// is logged, listed in the report, and the pass moves on.
pub async fn reconcile(snapshot: &DirectorySnapshot, store: &dyn KvStore) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for user in snapshot.eligible_users() {
        reconcile_into(store, UserAttitude::from_directory(user), &mut report.users).await;
    }
    for channel in snapshot.eligible_groups() {
        reconcile_into(store, GroupAttitude::from_directory(channel), &mut report.groups).await;
    }

    tracing::info!(
        users_created = report.users.created,
        users_updated = report.users.updated,
        groups_created = report.groups.created,
        groups_updated = report.groups.updated,
        failed = report.failures(),
        "reconciliation pass complete"
    );
    report
}

async fn reconcile_into<R: AttitudeRecord>(store: &dyn KvStore, candidate: R, counts: &mut PassCounts) {
    let entity = EntityRef::of(&candidate);
    match reconcile_one(store, candidate).await {
        Ok(outcome) => counts.record(outcome),
        Err(e) => {
            tracing::error!(kind = R::KIND, key = %entity.key, error = %e, "reconcile failed for entity");
            counts.failed.push(entity);
        }
    }
}

/// Create, update, or leave alone one record.
///
/// A stored payload that does not decode is reported as an error and left in
/// place for the repair pass.
pub async fn reconcile_one<R: AttitudeRecord>(
    store: &dyn KvStore,
    mut candidate: R,
) -> Result<Outcome, AttitudeError> {
    let key = candidate.key().to_string();

    let Some(raw) = store.get(&key, R::PARTITION).await? else {
        tracing::debug!(kind = R::KIND, key = %key, "no stored record, creating");
        save(store, &candidate).await?;
        return Ok(Outcome::Created);
    };

    let stored: R = decode(&key, &raw)?;
    candidate.adopt_operator_fields(&stored);

    if candidate.directory_fields_differ(&stored) {
        tracing::debug!(kind = R::KIND, key = %key, "directory fields drifted, updating");
        save(store, &candidate).await?;
        Ok(Outcome::Updated)
    } else {
        Ok(Outcome::Unchanged)
    }
}
