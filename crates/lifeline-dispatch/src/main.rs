//! # lifeline-dispatch
//!
//! Lifeline dispatch server binary — wires together settings, the `SQLite`
//! store, and the WebSocket relay server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lifeline_server::config::ServerConfig;
use lifeline_server::server::RelayServer;
use lifeline_store::{new_file, run_migrations, ConnectionConfig, DispatchStore};

/// Lifeline dispatch server.
#[derive(Parser, Debug)]
#[command(name = "lifeline-dispatch", about = "Lifeline dispatch server")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings if specified).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file.
    #[arg(long)]
    settings_path: Option<PathBuf>,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".lifeline").join("lifeline.db")
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first — the log level lives there.
    let settings_path = args
        .settings_path
        .unwrap_or_else(lifeline_settings::settings_path);
    let settings =
        lifeline_settings::load_settings_from_path(&settings_path).unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_filter_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Database
    let db_path = args
        .db_path
        .or_else(|| settings.store.db_path.clone().map(PathBuf::from))
        .unwrap_or_else(Cli::default_db_path);
    ensure_parent_dir(&db_path)?;
    let conn_config = ConnectionConfig {
        pool_size: settings.store.pool_size,
        busy_timeout_ms: settings.store.busy_timeout_ms,
        ..ConnectionConfig::default()
    };
    let pool = new_file(&db_path.to_string_lossy(), &conn_config)
        .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let _ = run_migrations(&conn).context("Failed to run migrations")?;
    }
    let store = DispatchStore::new(pool);
    tracing::info!(db = %db_path.display(), "store ready");

    // Server config: settings, then CLI overrides.
    let mut config = ServerConfig::from(&settings.server);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let metrics_handle = lifeline_server::metrics::install_recorder();
    let server = RelayServer::new(config, store).with_metrics(metrics_handle);

    let listener = server.bind().await.context("Failed to bind server")?;
    let addr = listener.local_addr()?;
    tracing::info!("lifeline dispatch listening on http://{addr}");

    // Ctrl-C fires the shutdown coordinator; serve() returns once the
    // graceful drain completes.
    let shutdown = Arc::clone(server.shutdown());
    drop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            shutdown.shutdown();
        }
    }));

    server.serve(listener).await.context("Server error")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
