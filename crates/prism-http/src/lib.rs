//! PRISM's Event Router: the board webhook, the source-tree file watcher,
//! and the worker pool that dispatches both (and explicit CLI invocations)
//! to the current-task briefing generator and the Task Augmenter.
//!
//! - [`types`]: the webhook's wire format (`WebhookPayload`) and its
//!   translation into a [`prism_core::event_queue::PrismEvent`].
//! - [`handlers`] + [`routes`] + [`server`]: the axum `POST /webhook` /
//!   `GET /health` surface.
//! - [`watcher`]: the debounced file watcher (`notify`-backed).
//! - [`router`]: [`EventRouter`], which spawns the watcher and worker pool
//!   and, once asked, the webhook listener, tying all three event sources
//!   to one [`prism_core::event_queue::EventQueue`].

#![warn(missing_docs)]

pub mod handlers;
pub mod router;
pub mod routes;
pub mod server;
pub mod types;
pub mod watcher;

pub use router::{EventRouter, EventRouterConfig};
pub use server::{AppState, HttpServer, HttpServerConfig};
pub use types::{HealthResponse, WebhookEventType, WebhookPayload};
pub use watcher::FileWatcher;

use std::sync::Arc;

use prism_config::AppContext;

/// Start the full Event Router (watcher, worker pool, webhook listener) for
/// `ctx` and run until shutdown. The thin wrapper `prism serve` calls.
pub async fn serve(ctx: Arc<AppContext>, config: EventRouterConfig) -> anyhow::Result<()> {
    let http_config = config.http.clone();
    let router = EventRouter::spawn(ctx, &config);
    router.serve_http(http_config).await
}
