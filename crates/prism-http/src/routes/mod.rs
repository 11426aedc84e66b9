//! Route table: the board webhook and a health check, nothing else.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::server::AppState;

/// The full router: `POST /webhook`, `GET /health`.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handlers::webhook_handler))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
