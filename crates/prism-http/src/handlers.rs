//! The Event Router's HTTP handlers: the board webhook and a health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use prism_core::event_queue::EnqueueError;
use tracing::{info, warn};

use crate::server::AppState;
use crate::types::{HealthResponse, WebhookError, WebhookPayload};

/// `POST /webhook`: accept a board state-transition event, enqueue it, and
/// return immediately. Handling happens asynchronously on the worker pool;
/// this handler never waits on it.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    let event = match payload.into_event() {
        Ok(event) => event,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(WebhookError { error: err.0 })).into_response();
        }
    };

    match state.queue.try_enqueue(event) {
        Ok(envelope) => {
            info!(event_id = %envelope.id, key = %envelope.key(), "enqueued webhook event");
            StatusCode::ACCEPTED.into_response()
        }
        Err(EnqueueError::QueueFull) => {
            warn!("webhook queue at capacity, responding 503 so the sender retries");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(EnqueueError::Closed) => {
            warn!("webhook queue closed, responding 503");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// `GET /health`: liveness/uptime check. Always `200` while the process is
/// up — board unavailability or a stalled handler never fails this, per
/// the spec's graceful-degradation scenario.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use prism_core::event_queue::EventQueue;
    use tower::ServiceExt;

    fn router_with_capacity(capacity: usize) -> (axum::Router, EventQueue) {
        let (queue, _receiver) = EventQueue::bounded(capacity);
        let state = Arc::new(AppState::new(queue.clone()));
        (crate::routes::api_routes(state), queue)
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let (app, _queue) = router_with_capacity(8);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_webhook_is_rejected() {
        let (app, _queue) = router_with_capacity(8);
        let body = serde_json::json!({ "event_type": "task_moved", "board_id": "b-1", "project_id": "p" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_webhook_is_accepted() {
        let (app, _queue) = router_with_capacity(8);
        let body = serde_json::json!({
            "event_type": "task_moved",
            "board_id": "b-1",
            "project_id": "p",
            "from_column": "ready",
            "to_column": "in-progress",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn full_queue_yields_503() {
        let (app, queue) = router_with_capacity(1);
        queue
            .try_enqueue(prism_core::event_queue::PrismEvent::Explicit {
                project_id: "p".into(),
                subject: "filler".into(),
            })
            .unwrap();

        let body = serde_json::json!({
            "event_type": "task_created",
            "board_id": "b-2",
            "project_id": "p",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
