use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler::{self, AppState};

/// Build the axum router: `POST /jsonrpc` and `GET /health`.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/jsonrpc", post(handler::jsonrpc_handler))
        .route("/health", get(handler::health_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
