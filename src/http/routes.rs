use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Live session control
        .route("/live/start", post(handlers::start_live))
        .route("/live/stop", post(handlers::stop_live))
        // Live session queries
        .route("/live/status", get(handlers::live_status))
        .route("/live/transcript", get(handlers::live_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
