//! The webhook endpoint's axum server: shared state and the listener loop.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use prism_core::event_queue::EventQueue;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::api_routes;

/// Configuration for the webhook listener.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Interface to bind to.
    pub host: String,
    /// Port to listen on (default `8765`, per the spec's external interface).
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8765 }
    }
}

/// State shared across every request: the bounded queue webhook deliveries
/// are enqueued into, and the time the process started (for `/health`).
pub struct AppState {
    /// Start time, for uptime reporting.
    pub started_at: Instant,
    /// The Event Router's enqueue handle. Cheap to clone; shared with the
    /// file watcher and any CLI-originated explicit invocations.
    pub queue: EventQueue,
}

impl AppState {
    /// Build state around an already-constructed [`EventQueue`].
    pub fn new(queue: EventQueue) -> Self {
        Self { started_at: Instant::now(), queue }
    }
}

/// The webhook endpoint's axum server.
pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Build a server bound to `config`, serving requests against `queue`.
    pub fn new(config: HttpServerConfig, queue: EventQueue) -> Self {
        Self { config, state: Arc::new(AppState::new(queue)) }
    }

    /// Bind and serve until the process is signalled to stop. Returns once
    /// the listener itself fails; callers coordinate graceful shutdown of
    /// the worker pool and file watcher separately (see [`crate::router::EventRouter`]).
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "webhook endpoint listening");

        let app = api_routes(self.state).layer(TraceLayer::new_for_http());
        axum::serve(listener, app).await?;
        Ok(())
    }
}
