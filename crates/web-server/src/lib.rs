//! # Helmsman Control Surface
//!
//! Thin HTTP layer over the supervisor: status, recent logs, engine
//! start/stop, user enable/disable and forced liquidity adjustment. Bot CRUD
//! and authentication live in the separate frontend service; this surface is
//! deliberately minimal.

use axum::{
    routing::{get, post},
    Router,
};
use engine::Supervisor;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
}

/// Builds the router; separated from `run_server` so tests can drive it.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/status", get(handlers::get_status))
        .route("/api/logs/:strategy", get(handlers::get_logs))
        .route(
            "/api/strategies/:strategy/start",
            post(handlers::start_strategy),
        )
        .route(
            "/api/strategies/:strategy/stop",
            post(handlers::stop_strategy),
        )
        .route("/api/users/:user_id/enable", post(handlers::enable_user))
        .route("/api/users/:user_id/disable", post(handlers::disable_user))
        .route(
            "/api/bots/:bot_id/adjust-liquidity",
            post(handlers::adjust_liquidity),
        )
        .with_state(state)
        .layer(cors)
}

/// Serves the control surface until the process shuts down.
pub async fn run_server(addr: SocketAddr, supervisor: Arc<Supervisor>) -> anyhow::Result<()> {
    let state = Arc::new(AppState { supervisor });
    let router = app(state);

    tracing::info!(%addr, "control surface listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
