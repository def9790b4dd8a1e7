//! parley server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_server::config::ServerConfig;
use parley_server::metrics::install_recorder;
use parley_server::server::ParleyServer;
use parley_store::{SqliteConfig, SqliteStore, Store};

/// Real-time presence and conversation-fanout server.
#[derive(Parser, Debug)]
#[command(name = "parley-server", version, about)]
struct Args {
    /// Path to a JSON config file (PARLEY_* env vars override it).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path; omit for an in-memory store.
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::load(args.config.as_deref()).context("loading configuration")?;

    let store: Arc<dyn Store> = match &args.db {
        Some(path) => {
            let path = path.to_str().context("database path is not valid UTF-8")?;
            info!(path, "opening sqlite store");
            Arc::new(SqliteStore::open(path, &SqliteConfig::default())?)
        }
        None => {
            info!("using in-memory sqlite store");
            Arc::new(SqliteStore::in_memory(&SqliteConfig::default())?)
        }
    };

    let metrics = install_recorder();
    let server = ParleyServer::new(config, store, metrics);
    let (addr, serve_handle) = server.listen().await.context("binding listener")?;
    info!(%addr, "parley server running");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    server
        .shutdown()
        .graceful_shutdown(vec![serve_handle], None)
        .await;
    Ok(())
}
