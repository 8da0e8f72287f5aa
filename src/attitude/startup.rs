//! Startup sequence: reconcile, validate, repair if needed, reconcile again.
//!
//! Runs once before the service accepts traffic. The passes run one after
//! another, never concurrently, because each does read-modify-write on the same
//! keys. If repair leaves any record invalid the service must not start.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::directory::Directory;
use super::reconcile::{reconcile, ReconcileReport};
use super::repair::{repair_all, RepairReport};
use super::store::KvStore;
use super::validate::{validate_all, ValidationReport};

#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub reconcile: ReconcileReport,
    pub validation: ValidationReport,
    /// Present only when validation found problems.
    pub repair: Option<RepairReport>,
    pub post_reconcile: ReconcileReport,
    /// Re-check after repair; absent when no repair was needed.
    pub final_validation: Option<ValidationReport>,
}

impl StartupReport {
    /// `true` when the store ended up fully valid.
    pub fn healthy(&self) -> bool {
        match &self.final_validation {
            Some(v) => v.all_valid(),
            None => self.validation.all_valid(),
        }
    }
}

/// Run the full startup sequence. Errors if the directory cannot be read or if
/// the store is still invalid after repair.
pub async fn run_startup(directory: &dyn Directory, store: &dyn KvStore) -> Result<StartupReport> {
    let snapshot = directory
        .snapshot()
        .await
        .context("failed to read directory")?;
    tracing::info!(
        users = snapshot.eligible_users().count(),
        groups = snapshot.eligible_groups().count(),
        "directory loaded"
    );

    let reconcile_report = reconcile(&snapshot, store).await;
    let validation = validate_all(&snapshot, store).await;

    let repair = if validation.all_valid() {
        None
    } else {
        Some(repair_all(&snapshot, store).await)
    };

    let post_reconcile = reconcile(&snapshot, store).await;

    let final_validation = match &repair {
        Some(_) => Some(validate_all(&snapshot, store).await),
        None => None,
    };

    let report = StartupReport {
        reconcile: reconcile_report,
        validation,
        repair,
        post_reconcile,
        final_validation,
    };

    if !report.healthy() {
        let remaining = report
            .final_validation
            .as_ref()
            .map(|v| v.invalid_count())
            .unwrap_or_default();
        bail!("{remaining} attitude record(s) still invalid after repair");
    }

    if let Some(repair) = &report.repair {
        if !repair.successful() {
            tracing::warn!(
                failed = repair.failed.len(),
                "some repairs failed but the store validated afterwards"
            );
        }
    }

    tracing::info!(writes = report.reconcile.writes(), "attitude store ready");
    Ok(report)
}
