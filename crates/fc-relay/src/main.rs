//! # FrameChat Relay
//!
//! Run with `fc-relay`; configure through `FC_RELAY__*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use fc_relay::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = fc_common::AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.relay.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting FrameChat relay...");

    let addr = config.relay.bind_addr();
    let state = Arc::new(AppState::new(config));
    let app = fc_relay::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Relay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
