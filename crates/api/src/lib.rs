//! HTTP API layer for osccai.
//!
//! - **Endpoints**: polls, statements, votes, recalculation, constitutions,
//!   API key management, cron, webhooks and the system event log
//! - **Extractors**: caller credentials, manager access, JSON bodies
//! - **Middleware**: API key and session authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;

use axum::Router;

pub use endpoints::{health_router, router};
pub use middleware::{AppState, HeaderSessions, NoSessions, SessionResolver, auth_middleware};

/// The API under `/api` behind the auth middleware, plus the health check.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .merge(health_router())
        .with_state(state)
}
