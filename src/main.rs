//! Server binary: load config, wire the pipeline, serve until shutdown.

use anyhow::Context;
use mtg_card_scanner::server::{router, AppState};
use mtg_card_scanner::{GeminiClient, ScanConfig, Scanner, ScryfallClient};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; the environment proper always wins.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mtg_card_scanner=info,cardscan_server=info")),
        )
        .init();

    let config = ScanConfig::from_env().context("configuration error")?;
    tracing::info!(?config, "configuration loaded");

    let vision = Arc::new(GeminiClient::new(&config));
    let catalog = Arc::new(ScryfallClient::new(&config.scryfall_base_url));
    let bind_addr = format!("{}:{}", config.host, config.port);
    let scanner = Arc::new(Scanner::new(config, vision, catalog));

    let app = router(AppState { scanner });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "card scanner listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
