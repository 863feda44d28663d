mod config;
mod decode;
mod error;
mod ingest;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relief_core::catalog::CatalogStore;

use config::Config;
use ingest::IngestService;
use server::ReliefServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting relief-locator MCP server");

    let config = Config::from_env()?;
    info!(
        assumed_speed_kmh = config.engine.assumed_speed_kmh,
        mapping_threshold = config.engine.mapping_confidence_threshold,
        vocabulary = config.vocabulary_path.as_deref().unwrap_or("built-in"),
        "configuration loaded"
    );

    let store = Arc::new(CatalogStore::new());
    let ingest = Arc::new(IngestService::new(&config.engine, Arc::clone(&store)));
    let server = ReliefServer::new(&config.engine, store, ingest);

    if let Some(path) = &config.dataset_path {
        server.preload(std::path::Path::new(path))?;
    } else {
        info!("no startup dataset configured, waiting for upload_dataset");
    }

    if let Some(addr) = &config.tcp_listen_addr {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
