//! # DTS Server
//!
//! Thin wrapper binary for running the transfer orchestration engine as a
//! standalone service.
//!
//! ## Usage
//!
//! ```bash
//! # Run with the default configuration file
//! cargo run --bin dts-server
//!
//! # Run with a specific configuration file
//! DTS_CONFIG=/etc/dts/dts.toml cargo run --bin dts-server
//! ```

use std::path::PathBuf;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use dts_orchestration::TransferService;
use dts_shared::config::DtsConfig;
use dts_shared::logging;
use dts_shared::providers::ProviderRegistry;

/// Bound on graceful shutdown, so a stuck provider cannot hang the exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    info!("Starting DTS server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("DTS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dts.toml"));
    let config = DtsConfig::load(Some(&config_path))?;
    config.validate()?;

    let registry = std::sync::Arc::new(ProviderRegistry::new(config.clone()));
    let service = TransferService::new(config, registry);
    service.start().await?;

    info!("DTS server started successfully");
    info!("   Press Ctrl+C to shutdown gracefully");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, service.stop()).await {
        Ok(Ok(())) => info!("Transfer service stopped"),
        Ok(Err(e)) => error!(error = %e, "Transfer service did not stop cleanly"),
        Err(_) => error!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Graceful shutdown timed out, forcing exit"
        ),
    }

    info!("DTS server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
