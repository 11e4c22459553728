//! CyberVault — self-hosted credential vault.
//!
//! Startup order matters: logging first, then config, then the database
//! migration (fatal on failure), and only then the gateway. No request is
//! served against a partially-migrated store.

mod auth;
mod config;
mod db;
mod error;
mod gateway;
mod security;
mod vault;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cybervault", version, about = "Self-hosted credential vault")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db_path) = cli.db {
        config.storage.db_path = db_path;
    }

    let db = db::Db::open(&config.storage.db_path)?;
    // Abort startup on a failed migration rather than serve requests
    // against a half-migrated store.
    db.migrate()?;
    tracing::info!(db = %config.storage.db_path.display(), "database ready");

    let state = gateway::AppState::from_config(db, &config);
    match state.accounts.count() {
        Ok(count) => tracing::info!(accounts = count, "vault opened"),
        Err(e) => tracing::warn!(error = %e, "could not count accounts"),
    }

    gateway::run_gateway(&config.gateway.host, config.gateway.port, state).await
}
