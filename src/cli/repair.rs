//! CLI `repair` command: the full startup sequence, reported.

use anyhow::Result;

use crate::config::RapportConfig;

pub async fn repair(config: &RapportConfig) -> Result<()> {
    let service = crate::server::open_service(config)?;
    let report = service.startup().await?;

    println!("Repair");
    println!("{}", "=".repeat(40));
    println!("Initial reconcile:");
    super::print_pass_counts("users", &report.reconcile.users);
    super::print_pass_counts("groups", &report.reconcile.groups);
    println!();
    println!(
        "Validation: {} checked, {} invalid",
        report.validation.checked,
        report.validation.invalid_count()
    );

    match &report.repair {
        None => println!("No repair needed."),
        Some(repair) => {
            println!(
                "Repaired {} record(s), {} with salvaged fields, {} already healthy",
                repair.repaired.len(),
                repair.salvaged,
                repair.healthy
            );
            for entity in &repair.repaired {
                println!("  repaired: {entity}");
            }
            for entity in &repair.failed {
                println!("  failed:   {entity}");
            }
        }
    }

    println!("All records valid.");
    Ok(())
}
