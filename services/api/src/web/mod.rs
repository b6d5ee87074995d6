pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_teacher;
pub use rest::{
    cache_status_handler, cache_version_handler, clear_cache_handler, get_classrooms_handler,
    import_snapshot_handler,
};
use state::AppState;

/// Builds the API routes. Every route requires a teacher identity.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard/classrooms", get(get_classrooms_handler))
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/status", get(cache_status_handler))
        .route("/cache/version", get(cache_version_handler))
        .route("/snapshots", post(import_snapshot_handler))
        .layer(axum_middleware::from_fn(require_teacher))
        .with_state(app_state)
}
