//! # NexusGateway Server
//!
//! Parses configuration, discovers models, and serves the gateway until a
//! shutdown signal arrives.

use nexus_gateway::{create_router, shutdown_signal, AppState, Config};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    let refresh_task = config.model_refresh_interval().map(|interval| {
        info!(interval_secs = interval.as_secs(), "Periodic model refresh enabled");
        state.registry.clone().spawn_refresh(interval, shutdown.clone())
    });

    info!(
        models = state.registry.catalog().len(),
        endpoints = state.registry.endpoints().len(),
        transcription_servers = state.transcription.total(),
        "Model catalog ready"
    );

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("NexusGateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(task) = refresh_task {
        let _ = task.await;
    }
    info!("Server stopped");

    Ok(())
}
