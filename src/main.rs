mod api;
mod attitude;
mod cli;
mod config;
mod db;
mod prompt;
mod retry;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rapport", version, about = "Attitude records for chat agents, served over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server on the configured transport (stdio by default)
    Serve,
    /// Start the MCP server over HTTP, with the management API if enabled
    ServeHttp,
    /// Run one reconciliation pass against the directory
    Sync,
    /// Report database health, invalid records, and orphans
    Check,
    /// Reconcile, validate, and repair invalid records
    Repair,
    /// Delete a user's attitude record
    DeleteUser {
        /// Platform user id
        user_id: String,
    },
    /// Delete a group's attitude record
    DeleteGroup {
        /// Platform channel id, e.g. group_437383440
        group_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::RapportConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => match config.server.transport.as_str() {
            "http" => server::serve_http(config).await?,
            _ => server::serve_stdio(config).await?,
        },
        Command::ServeHttp => server::serve_http(config).await?,
        Command::Sync => cli::sync::sync(&config).await?,
        Command::Check => cli::check::check(&config).await?,
        Command::Repair => cli::repair::repair(&config).await?,
        Command::DeleteUser { user_id } => cli::delete::delete_user(&config, &user_id).await?,
        Command::DeleteGroup { group_id } => cli::delete::delete_group(&config, &group_id).await?,
    }

    Ok(())
}
