//! Repair pass: rebuild missing or corrupt records, keeping whatever operator
//! data survived.
//!
//! Directory-owned fields always come from the directory. Operator-owned fields
//! come from a [`Salvage`] of the raw payload: a full JSON object parse when
//! possible, otherwise a scan for complete `"field": "string"` pairs so even a
//! truncated payload gives up the keys that made it to disk.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::error::AttitudeError;
use super::save;
use super::store::KvStore;
use super::types::{AttitudeRecord, DirectorySnapshot, EntityRef, GroupAttitude, UserAttitude};
use super::validate::{inspect, RecordState};

const OPERATOR_FIELDS: [&str; 4] = ["nickname", "attitude", "relationship", "other"];

static FIELD_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(nickname|attitude|relationship|other)"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("field pair pattern is valid")
});

/// Operator-owned values recovered from a damaged payload. Only string values
/// are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalvagedFields {
    pub nickname: Option<String>,
    pub attitude: Option<String>,
    pub relationship: Option<String>,
    pub other: Option<String>,
}

impl SalvagedFields {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "nickname" => &mut self.nickname,
            "attitude" => &mut self.attitude,
            "relationship" => &mut self.relationship,
            "other" => &mut self.other,
            _ => return,
        };
        slot.get_or_insert(value);
    }

    fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.attitude.is_none()
            && self.relationship.is_none()
            && self.other.is_none()
    }
}

/// Outcome of loosely reading a damaged payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Salvage {
    Recovered(SalvagedFields),
    Unrecoverable,
}

impl Salvage {
    pub fn from_payload(raw: &str) -> Self {
        let fields = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => {
                let mut fields = SalvagedFields::default();
                for name in OPERATOR_FIELDS {
                    if let Some(value) = map.get(name).and_then(|v| v.as_str()) {
                        fields.set(name, value.to_string());
                    }
                }
                fields
            }
            Ok(_) => SalvagedFields::default(),
            Err(_) => scan_fragments(raw),
        };

        if fields.is_empty() {
            Salvage::Unrecoverable
        } else {
            Salvage::Recovered(fields)
        }
    }

    pub fn fields(&self) -> SalvagedFields {
        match self {
            Salvage::Recovered(fields) => fields.clone(),
            Salvage::Unrecoverable => SalvagedFields::default(),
        }
    }
}

/// Pull complete string pairs out of text that is not valid JSON.
fn scan_fragments(raw: &str) -> SalvagedFields {
    let mut fields = SalvagedFields::default();
    for caps in FIELD_PAIR.captures_iter(raw) {
        let literal = format!("\"{}\"", &caps[2]);
        if let Ok(value) = serde_json::from_str::<String>(&literal) {
            fields.set(&caps[1], value);
        }
    }
    fields
}

/// Records that can take salvaged operator fields.
pub trait Repairable: AttitudeRecord {
    /// Fill operator-owned fields from salvage, empty where nothing survived.
    /// Returns `true` if at least one field of this shape was kept.
    fn restore_operator_fields(&mut self, salvaged: SalvagedFields) -> bool;
}

impl Repairable for UserAttitude {
    fn restore_operator_fields(&mut self, salvaged: SalvagedFields) -> bool {
        let kept = !salvaged.is_empty();
        self.nickname = salvaged.nickname.unwrap_or_default();
        self.attitude = salvaged.attitude.unwrap_or_default();
        self.relationship = salvaged.relationship.unwrap_or_default();
        self.other = salvaged.other.unwrap_or_default();
        kept
    }
}

impl Repairable for GroupAttitude {
    fn restore_operator_fields(&mut self, salvaged: SalvagedFields) -> bool {
        let kept = salvaged.attitude.is_some() || salvaged.other.is_some();
        self.attitude = salvaged.attitude.unwrap_or_default();
        self.other = salvaged.other.unwrap_or_default();
        kept
    }
}

/// What the pass did for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Record was present and valid; nothing written.
    Healthy,
    /// Record was rewritten.
    Repaired { salvaged: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub healthy: usize,
    pub repaired: Vec<EntityRef>,
    /// Repaired records that kept at least one operator field.
    pub salvaged: usize,
    pub failed: Vec<EntityRef>,
}

impl RepairReport {
    /// `false` if any entity could not be repaired.
    pub fn successful(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Repair every eligible entity whose record is missing or malformed.
/// Keeps going after individual failures.
pub async fn repair_all(snapshot: &DirectorySnapshot, store: &dyn KvStore) -> RepairReport {
    let mut report = RepairReport::default();

    for user in snapshot.eligible_users() {
        repair_into(store, UserAttitude::from_directory(user), &mut report).await;
    }
    for channel in snapshot.eligible_groups() {
        repair_into(store, GroupAttitude::from_directory(channel), &mut report).await;
    }

    if report.successful() {
        tracing::info!(
            repaired = report.repaired.len(),
            salvaged = report.salvaged,
            "repair pass complete"
        );
    } else {
        tracing::error!(
            repaired = report.repaired.len(),
            failed = report.failed.len(),
            "repair pass finished with failures"
        );
    }
    report
}

async fn repair_into<R: Repairable>(store: &dyn KvStore, candidate: R, report: &mut RepairReport) {
    let entity = EntityRef::of(&candidate);
    match repair_one(store, candidate).await {
        Ok(RepairOutcome::Healthy) => report.healthy += 1,
        Ok(RepairOutcome::Repaired { salvaged }) => {
            if salvaged {
                report.salvaged += 1;
            }
            report.repaired.push(entity);
        }
        Err(e) => {
            tracing::error!(kind = R::KIND, key = %entity.key, error = %e, "repair failed for entity");
            report.failed.push(entity);
        }
    }
}

/// Repair one record. `candidate` carries the directory-owned fields.
///
/// A read failure is returned as an error rather than treated as absence, so a
/// record that might be fine is never overwritten blind.
pub async fn repair_one<R: Repairable>(
    store: &dyn KvStore,
    mut candidate: R,
) -> Result<RepairOutcome, AttitudeError> {
    let key = candidate.key().to_string();

    let salvage = match inspect::<R>(store, &key).await? {
        RecordState::Valid(_) => return Ok(RepairOutcome::Healthy),
        RecordState::Missing => {
            tracing::warn!(kind = R::KIND, key = %key, "record missing, writing directory defaults");
            Salvage::Unrecoverable
        }
        RecordState::Malformed { raw, error } => {
            let salvage = Salvage::from_payload(&raw);
            tracing::warn!(
                kind = R::KIND,
                key = %key,
                error = %error,
                recovered = matches!(salvage, Salvage::Recovered(_)),
                "record malformed, rebuilding"
            );
            salvage
        }
    };

    let salvaged = candidate.restore_operator_fields(salvage.fields());
    save(store, &candidate).await?;
    Ok(RepairOutcome::Repaired { salvaged })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvage_from_object_with_missing_fields() {
        let salvage = Salvage::from_payload(r#"{"attitude":"friendly","bogus":1}"#);
        assert_eq!(
            salvage,
            Salvage::Recovered(SalvagedFields {
                attitude: Some("friendly".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn salvage_ignores_non_string_values() {
        let salvage = Salvage::from_payload(r#"{"attitude":5,"other":"kept"}"#);
        let fields = salvage.fields();
        assert_eq!(fields.attitude, None);
        assert_eq!(fields.other.as_deref(), Some("kept"));
    }

    #[test]
    fn salvage_from_truncated_payload() {
        let raw = r#"{"id":7,"user_id":"u7","username":"alice","nickname":"Al","attitude":"warm \"really\"","relationship":"fri"#;
        let fields = Salvage::from_payload(raw).fields();
        assert_eq!(fields.nickname.as_deref(), Some("Al"));
        assert_eq!(fields.attitude.as_deref(), Some("warm \"really\""));
        // cut mid-string, nothing to keep
        assert_eq!(fields.relationship, None);
        assert_eq!(fields.other, None);
    }

    #[test]
    fn garbage_is_unrecoverable() {
        assert_eq!(Salvage::from_payload("\u{0}\u{1}garbage"), Salvage::Unrecoverable);
        assert_eq!(Salvage::from_payload("[1,2,3]"), Salvage::Unrecoverable);
        assert_eq!(Salvage::from_payload(r#"{"bogus":1}"#), Salvage::Unrecoverable);
    }

    #[test]
    fn group_restore_uses_only_group_fields() {
        let mut group = GroupAttitude {
            id: 1,
            group_id: "g".into(),
            channel_name: "c".into(),
            attitude: "old".into(),
            other: "old".into(),
        };
        let kept = group.restore_operator_fields(SalvagedFields {
            nickname: Some("ignored".into()),
            attitude: Some("calm".into()),
            ..Default::default()
        });
        assert!(kept);
        assert_eq!(group.attitude, "calm");
        assert_eq!(group.other, "");
    }

    #[test]
    fn group_restore_reports_nothing_kept_for_user_only_fields() {
        let mut group = GroupAttitude::from_directory(&crate::attitude::types::DirectoryChannel {
            id: 10,
            channel_id: "group_10".into(),
            channel_name: "Rustaceans".into(),
            channel_type: "group".into(),
        });
        let kept = group.restore_operator_fields(SalvagedFields {
            nickname: Some("x".into()),
            relationship: Some("y".into()),
            ..Default::default()
        });
        assert!(!kept);
    }
}
