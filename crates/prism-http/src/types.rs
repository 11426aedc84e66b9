//! Wire types for the webhook endpoint.

use prism_core::event_queue::PrismEvent;
use serde::{Deserialize, Serialize};

/// The three event kinds the board sends, per `POST /webhook`'s body contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// A task moved between columns.
    TaskMoved,
    /// A task was created on the board.
    TaskCreated,
    /// A task was deleted from the board.
    TaskDeleted,
}

/// The JSON body `POST /webhook` accepts.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Which of the three event kinds this delivery carries.
    pub event_type: WebhookEventType,
    /// The board's identifier for the affected task.
    pub board_id: String,
    /// The project the task belongs to.
    pub project_id: String,
    /// Present on `task_moved` deliveries: the column the task left.
    #[serde(default)]
    pub from_column: Option<String>,
    /// Present on `task_moved` deliveries: the column the task entered.
    #[serde(default)]
    pub to_column: Option<String>,
}

/// Error returned for a structurally valid but semantically malformed
/// payload (e.g. `task_moved` missing `to_column`). The handler maps this
/// to a `400`.
#[derive(Debug, Clone)]
pub struct MalformedWebhook(pub String);

impl WebhookPayload {
    /// Translate this payload into the [`PrismEvent`] the Event Router's
    /// queue understands.
    pub fn into_event(self) -> Result<PrismEvent, MalformedWebhook> {
        match self.event_type {
            WebhookEventType::TaskMoved => {
                let to_column = self
                    .to_column
                    .ok_or_else(|| MalformedWebhook("task_moved requires to_column".to_string()))?;
                let from_column = self.from_column.unwrap_or_default();
                Ok(PrismEvent::BoardTaskMoved {
                    project_id: self.project_id,
                    board_id: self.board_id,
                    from_column,
                    to_column,
                })
            }
            WebhookEventType::TaskCreated => Ok(PrismEvent::BoardTaskCreated {
                project_id: self.project_id,
                board_id: self.board_id,
            }),
            WebhookEventType::TaskDeleted => Ok(PrismEvent::BoardTaskDeleted {
                project_id: self.project_id,
                board_id: self.board_id,
            }),
        }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving requests.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Response body for a rejected webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookError {
    /// Human-readable reason the delivery was rejected.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_moved_requires_to_column() {
        let payload = WebhookPayload {
            event_type: WebhookEventType::TaskMoved,
            board_id: "b-1".into(),
            project_id: "proj".into(),
            from_column: Some("ready".into()),
            to_column: None,
        };
        assert!(payload.into_event().is_err());
    }

    #[test]
    fn task_moved_converts_to_board_task_moved_event() {
        let payload = WebhookPayload {
            event_type: WebhookEventType::TaskMoved,
            board_id: "b-1".into(),
            project_id: "proj".into(),
            from_column: Some("ready".into()),
            to_column: Some("in-progress".into()),
        };
        let event = payload.into_event().unwrap();
        assert!(event.is_moved_to_in_progress());
    }
}
