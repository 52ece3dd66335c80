//! giveaway-gate server binary

use anyhow::Context;
use giveaway_gate::{observability, prelude::*, store};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    observability::init(&config.observability)?;

    let provider = Arc::new(
        OAuthClient::new(&config.oauth).context("Failed to create OAuth client")?,
    );
    let store = store::init(&config.store);
    let bind_address = config.server.bind_address();

    tracing::info!(
        service = %config.observability.service_name,
        persistence = store.as_ref().map_or("disabled", |store| store.backend()),
        "Starting server"
    );

    let app = router(AppState::new(config, provider, store));
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
