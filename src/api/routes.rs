//! API route definitions

use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Router;

use super::handlers;
use super::handlers::AppState;

/// Build the full router
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Health and sync state
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::get_metrics))
        // Identity registry
        .route("/resolve/:did", get(handlers::resolve_identity))
        .route("/register", post(handlers::register_identity))
        .route("/update/:did", put(handlers::update_identity))
        .with_state(state)
}
