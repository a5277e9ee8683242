use anyhow::Context;
use clap::Parser;
use infodoc_server::{app, http, telemetry, AppState, Cli};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    telemetry::init(&config.log).context("failed to initialize logging")?;

    let store = app::build_store(&config)
        .await
        .context("failed to open resource store")?;
    let state = Arc::new(AppState::new(store, &config));

    let (addr, server) = warp::serve(http::routes(state))
        .try_bind_with_graceful_shutdown(config.listen, shutdown_signal())
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(
        %addr,
        resource_type = %config.resource_type,
        body_limit = config.limits.body_limit(),
        "listening"
    );
    server.await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
