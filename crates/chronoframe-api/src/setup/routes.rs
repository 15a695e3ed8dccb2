//! Route configuration and setup

use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    tracing::info!(
        max_upload_mb = state.config.upload.max_payload_bytes / 1024 / 1024,
        whitelist_enabled = state.config.upload.mime_whitelist_enabled,
        duplicate_check = state.config.upload.duplicate_check.enabled,
        duplicate_mode = %state.config.upload.duplicate_check.mode,
        "Upload policy configured"
    );

    Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .route(
            "/api/photos/upload",
            // The pipeline enforces its own ceiling while streaming.
            put(handlers::photo_upload::upload_photo).layer(DefaultBodyLimit::disable()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
