use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sidelog_config::SidecarConfig;
use sidelog_monitor::Monitor;
use sidelog_store::StoreClient;

#[derive(Debug, Parser)]
#[command(
    name = "sidelog",
    version,
    about = "Sidecar that ships task log lines to the store and relays approval decisions"
)]
struct Cli {
    /// Load environment variables from this file before reading configuration.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SidecarConfig::from_env()?;
    let store = StoreClient::connect(&config.manager_host)
        .await
        .context("store access handshake failed")?;
    let monitor = Monitor::bootstrap(config, Arc::new(store)).await?;

    let (shutdown_tx, _) = watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received; draining in-flight work");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    monitor.run(shutdown_tx).await
}
