//! Operator commands run against the configured database.

pub mod check;
pub mod delete;
pub mod repair;
pub mod sync;

use crate::attitude::reconcile::PassCounts;

fn print_pass_counts(label: &str, counts: &PassCounts) {
    println!(
        "  {:<8} created {:<4} updated {:<4} unchanged {:<4} failed {}",
        label,
        counts.created,
        counts.updated,
        counts.unchanged,
        counts.failed.len()
    );
    for entity in &counts.failed {
        println!("    failed: {entity}");
    }
}
