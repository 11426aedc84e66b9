//! Wire types exchanged with the Kanban board's HTTP API.

use serde::{Deserialize, Serialize};

/// The board's view of a task: an opaque id plus whatever the board tracks
/// for status. PRISM never interprets `column` beyond comparing it against
/// the `in-progress`/`done` names the Event Router watches for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTask {
    /// The board's own identifier for this task.
    pub id: String,
    /// The project this task belongs to, as the board knows it.
    pub project_id: String,
    /// Task title.
    pub title: String,
    /// Task body/description, board-flavored Markdown.
    #[serde(default)]
    pub body: String,
    /// The column/status name the board currently has this task filed under.
    pub column: String,
}

/// Body of a `CreateTask` request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateTaskRequest<'a> {
    pub project_id: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// Response to a successful `CreateTask` call.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateTaskResponse {
    pub id: String,
}
