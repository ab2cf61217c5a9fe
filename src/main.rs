use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use morning_dashboard::config::Config;
use morning_dashboard::fetcher::Fetcher;
use morning_dashboard::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "morning_dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!("Loaded {} feeds from configuration", config.feeds.len());

    let fetcher = Fetcher::new(&config)?;
    let listen_addr = config.listen_addr.clone();

    let app = routes::router(Arc::new(AppState { config, fetcher }));

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Server starting on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
