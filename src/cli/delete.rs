//! CLI `delete-user` / `delete-group` commands.

use anyhow::Result;

use crate::attitude::store::DeleteOutcome;
use crate::config::RapportConfig;

pub async fn delete_user(config: &RapportConfig, user_id: &str) -> Result<()> {
    let service = crate::server::open_service(config)?;
    report("user", user_id, service.delete_user(user_id).await?);
    Ok(())
}

pub async fn delete_group(config: &RapportConfig, group_id: &str) -> Result<()> {
    let service = crate::server::open_service(config)?;
    report("group", group_id, service.delete_group(group_id).await?);
    Ok(())
}

fn report(kind: &str, key: &str, outcome: DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted => println!("Deleted {kind} record {key}."),
        DeleteOutcome::NotFound => println!("No {kind} record for {key}."),
    }
    println!("Note: the next reconciliation recreates it if the directory still lists {key}.");
}
