//! Attitude records for chat agents.
//!
//! Rapport keeps one record per directory user and per group channel in a
//! key-value store, describing how the agent should treat that user or group.
//! The host's directory is the system of record for identity; operators and the
//! agent itself own the attitude fields.
//!
//! # Architecture
//!
//! - **Passes**: reconcile (directory to store), validate (read-only), and
//!   repair (rebuild with salvage), run in sequence at startup
//! - **Storage**: SQLite `plugin_data` table behind the [`attitude::store::KvStore`] trait
//! - **Surfaces**: MCP tools over stdio or Streamable HTTP, an optional axum
//!   management API, and operator CLI commands
//!
//! # Modules
//!
//! - [`attitude`]: record types, store and directory adapters, the passes, and record operations
//! - [`api`]: HTTP management routes
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`prompt`]: prompt context assembly
//! - [`retry`]: call-site retry policy

pub mod api;
pub mod attitude;
pub mod config;
pub mod db;
pub mod prompt;
pub mod retry;
