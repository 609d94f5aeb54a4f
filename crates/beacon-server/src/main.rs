//! # beacon-server
//!
//! HTTP server for the beacon ranging engine.
//!
//! This binary provides:
//! - A ranging session against the configured beacon identity
//! - REST API exposing the detected set and the last ranging error
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development, simulated beacons
//! cargo run --package beacon-server
//!
//! # Production, real radio
//! BEACON_ENV=production ./beacon-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use beacon_server::{api, engine, logging};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Environment variable selecting the deployment environment.
const ENV_VAR: &str = "BEACON_ENV";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var(ENV_VAR).is_ok_and(|env| env == "production");
    logging::init(is_production)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting beacon-server");

    let config_path = engine::config_path();
    let config = engine::load_config(&config_path)?;
    info!(
        path = %config_path.display(),
        constraint = %config.constraint()?,
        source = ?config.source.kind,
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let engine = engine::spawn(&config, async move {
        let _ = shutdown_rx.await;
    })?;

    let app = api::create_router(engine.state.clone());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if shutdown_tx.send(()).is_err() {
        warn!("Ranging engine exited before shutdown");
    }
    engine.join().await?;

    info!("beacon-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
