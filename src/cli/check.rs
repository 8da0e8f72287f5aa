//! CLI `check` command: database health, record validation, and orphans.
//! Read-only.

use anyhow::{Context, Result};

use crate::attitude::validate::{find_orphans, validate_all};
use crate::config::RapportConfig;
use crate::db;

pub async fn check(config: &RapportConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `rapport serve` or `rapport sync` to initialize.");
        return Ok(());
    }

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let health = db::check_database_health(&conn).context("failed to run health check")?;
    drop(conn);

    println!("Rapport Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("Schema version:    {}", health.schema_version);
    println!();
    println!("Row counts:");
    println!("  Records:         {}", health.record_count);
    println!("  Users:           {}", health.user_count);
    println!("  Channels:        {}", health.channel_count);
    println!();
    if health.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", health.integrity_details);
    }

    let service = crate::server::open_service(config)?;
    let snapshot = service
        .directory()
        .snapshot()
        .await
        .context("failed to read directory")?;

    let report = validate_all(&snapshot, service.store()).await;
    println!();
    println!("Records checked:   {}", report.checked);
    println!("  Valid:           {}", report.valid);
    for (label, entities) in [
        ("Missing", &report.missing),
        ("Malformed", &report.malformed),
        ("Unreadable", &report.unreadable),
    ] {
        println!("  {:<16} {}", format!("{label}:"), entities.len());
        for entity in entities {
            println!("    {entity}");
        }
    }

    let orphans = find_orphans(&snapshot, service.store())
        .await
        .context("failed to list stored records")?;
    println!();
    println!("Orphaned records:  {}", orphans.len());
    for entity in &orphans {
        println!("  {entity}");
    }

    if !report.all_valid() {
        println!();
        println!("Run `rapport repair` to rebuild missing and malformed records.");
    }
    Ok(())
}
