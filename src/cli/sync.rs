//! CLI `sync` command: one reconciliation pass against the directory.

use anyhow::{Context, Result};

use crate::attitude::reconcile::reconcile;
use crate::config::RapportConfig;

pub async fn sync(config: &RapportConfig) -> Result<()> {
    let service = crate::server::open_service(config)?;
    let snapshot = service
        .directory()
        .snapshot()
        .await
        .context("failed to read directory")?;

    let report = reconcile(&snapshot, service.store()).await;

    println!("Reconciliation");
    println!("{}", "=".repeat(40));
    super::print_pass_counts("users", &report.users);
    super::print_pass_counts("groups", &report.groups);
    println!();
    println!("Writes: {}", report.writes());

    if report.failures() > 0 {
        println!("Some records could not be reconciled. Run `rapport repair`.");
    }
    Ok(())
}
