use anyhow::Context;
use marketcap_cache::{
    server, AppState, BirdeyeProvider, Config, MarketCapTracker, TokenAddress,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug ./marketcap-cache
    let config = Config::load();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    fmt().with_env_filter(env_filter).with_target(false).init();

    config.validate().context("invalid configuration")?;

    // A bad address only fails refresh cycles; the server still answers
    if let Err(e) = TokenAddress::parse(&config.token_address) {
        tracing::warn!(error = %e, "Configured token address is invalid, every refresh will fail");
    }

    let provider = BirdeyeProvider::new(config.birdeye()).context("failed to set up Birdeye")?;
    let tracker = Arc::new(MarketCapTracker::new(Arc::new(provider), config.tracker()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tracker.start_background_task(shutdown_rx);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let app = server::router(AppState::from_tracker(&tracker));
    server::serve(listener, app, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    })
    .await
    .context("server error")?;

    poller.await.context("tracker task panicked")?;
    Ok(())
}
