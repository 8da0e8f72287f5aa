//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Both entry points open the database, build the attitude service, and run the
//! startup sequence before accepting traffic. A failed startup aborts the
//! process.

use crate::attitude::directory::SqliteDirectory;
use crate::attitude::manage::AttitudeService;
use crate::attitude::store::SqliteStore;
use crate::config::RapportConfig;
use crate::db;
use crate::tools::RapportTools;
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

/// Open the DB, build the service, and bring the store in line with the
/// directory.
async fn setup_shared_state(config: RapportConfig) -> Result<(Arc<AttitudeService>, Arc<RapportConfig>)> {
    let service = open_service(&config)?;

    let report = service
        .startup()
        .await
        .context("attitude store failed startup checks")?;
    tracing::info!(
        created = report.reconcile.users.created + report.reconcile.groups.created,
        repaired = report.repair.as_ref().map(|r| r.repaired.len()).unwrap_or(0),
        "startup sequence complete"
    );

    Ok((Arc::new(service), Arc::new(config)))
}

/// Build an [`AttitudeService`] over the configured database without running
/// the startup sequence.
pub fn open_service(config: &RapportConfig) -> Result<AttitudeService> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let conn = Arc::new(Mutex::new(conn));
    let store = SqliteStore::new(Arc::clone(&conn), config.storage.plugin_key.clone());
    let directory = SqliteDirectory::new(conn);

    Ok(AttitudeService::new(
        Arc::new(store),
        Arc::new(directory),
        config.retry.policy(),
    ))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: RapportConfig) -> Result<()> {
    tracing::info!("starting rapport MCP server on stdio");

    let (service, config) = setup_shared_state(config).await?;

    let tools = RapportTools::new(service, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP, plus the management API when
/// enabled.
pub async fn serve_http(config: RapportConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting rapport server on HTTP");

    let (service, config) = setup_shared_state(config).await?;

    let mcp_service = Arc::clone(&service);
    let mcp_config = Arc::clone(&config);
    let mcp = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(RapportTools::new(mcp_service.clone(), mcp_config.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let mut router = axum::Router::new().nest_service("/mcp", mcp);
    if config.api.enabled {
        router = router.nest("/api", crate::api::router(service));
        tracing::info!(addr = %bind_addr, "management API at http://{bind_addr}/api");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
