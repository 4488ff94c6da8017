use anyhow::Result;
use clap::Parser;
use redash_gateway::{
    config::{Cli, GatewayConfig},
    create_router, AppState, HttpUpstream,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let cli = Cli::parse();
    let config = Arc::new(GatewayConfig::load(&cli)?);
    info!("Loaded configuration: {:?}", config);

    // Initialize upstream client
    let upstream = Arc::new(HttpUpstream::new(
        config.upstream.base_url.clone(),
        config.upstream_timeout(),
    )?);
    info!("Forwarding queries to {}", upstream.base_url());

    let app = create_router(AppState::new(config.clone(), upstream));

    // Start server
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let addr = listener.local_addr()?;
    info!("Redash Gateway listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
