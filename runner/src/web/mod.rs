//! HTTP server
//!
//! Exposes the command executor and the container manager as a small JSON
//! API.

pub mod api;
pub mod state;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Configuration for the web server
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Start the web server and run until Ctrl-C
pub async fn serve(config: WebConfig, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Command execution
        .route("/run-command", post(api::run_command))
        // Containers
        .route("/stop-all-containers", post(api::stop_all_containers))
        .route("/stop-container", post(api::stop_container))
        // Health
        .route("/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
