//! harbor server entry point.
//!
//! Loads configuration, opens the cache store, restores or registers the
//! configured controller version, and serves MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use harbor_client::{ControllerConfig, FetchClient, FetchConfig, Registration};
use harbor_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let controller = ControllerConfig::from_app(&config)?;

    let upstream = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        page_origin: Some(controller.scope.origin()),
        ..Default::default()
    })?;

    let cache = CacheDb::open(&config.db_path).await?;
    let registration = Registration::open(cache.clone(), Arc::new(upstream), controller).await?;

    tracing::info!(
        profile = ?config.profile,
        version = %config.version,
        scope = %config.scope,
        db = %config.db_path.display(),
        "Starting harbor server on stdio transport"
    );

    let handler = handler::HarborServer::new(registration, config);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    cache.close().await?;

    Ok(())
}
