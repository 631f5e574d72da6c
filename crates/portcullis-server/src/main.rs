//! Portcullis Server binary.

use anyhow::Context;
use portcullis_server::metrics::init_metrics;
use portcullis_server::{AppState, Settings, run_server_with_state};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    let addr = settings.server.socket_addr()?;

    tracing::info!(
        "Starting Portcullis Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        rate_limit = settings.rate_limit.enabled,
        cache = settings.cache.enabled,
        general_burst = settings.rate_limit.general.burst,
        sensitive_burst = settings.rate_limit.sensitive.burst,
        "Gateway layers configured"
    );

    let prometheus = init_metrics().context("failed to install metrics recorder")?;
    let state = AppState::from_settings(settings)?;
    let sweeper = state.start_sweeper();

    run_server_with_state(addr, state, prometheus).await?;

    sweeper.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}
