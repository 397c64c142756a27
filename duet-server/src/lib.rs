mod config;
mod room;
mod signaling;

pub use config::ServerConfig;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws/{participant_id}", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(service)
}

/// Serves the relay on an already bound listener until the task is dropped.
pub async fn serve_on(listener: TcpListener, service: SignalingService) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Signaling relay listening on {}", addr);

    axum::serve(listener, router(service))
        .await
        .context("Signaling relay stopped")?;
    Ok(())
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let service = SignalingService::new(RoomDirectory::new(), config.ice_servers);

    serve_on(listener, service).await
}
