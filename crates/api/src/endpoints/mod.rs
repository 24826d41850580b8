//! API endpoints.

mod cron;
mod events;
mod models;
mod polls;
mod webhooks;

use axum::{Router, routing::get};

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/polls", polls::router())
        .nest("/models", models::router())
        .nest("/api-keys", models::api_keys_router())
        .nest("/webhooks", webhooks::router())
        .merge(events::router())
        .merge(cron::router())
}

/// Liveness check.
pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(|| async { "ok" }))
}
