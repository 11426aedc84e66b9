//! Event types accepted by the Event Router's queue.
//!
//! An [`EventKey`] is what per-key serialization is keyed on: all events for
//! the same `(project_id, task_key)` are handled one at a time, in arrival
//! order, with a newer event's result superseding an older in-flight one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier a queued event is serialized against. Two events with
/// the same key never run their handlers concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// The project the event belongs to.
    pub project_id: String,
    /// A board id, file path, or task key — whatever distinguishes handlers
    /// within the project.
    pub subject: String,
}

impl EventKey {
    /// Build a key from a project id and an arbitrary subject string.
    pub fn new(project_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            subject: subject.into(),
        }
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_id, self.subject)
    }
}

/// A board column a task can occupy, as reported by a webhook payload.
pub type Column = String;

/// The three event sources named in the spec: board webhook, file watcher,
/// and explicit CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrismEvent {
    /// A board task moved between columns.
    BoardTaskMoved {
        project_id: String,
        board_id: String,
        from_column: Column,
        to_column: Column,
    },
    /// A board task was created.
    BoardTaskCreated { project_id: String, board_id: String },
    /// A board task was deleted.
    BoardTaskDeleted { project_id: String, board_id: String },
    /// A task-list file under a watched specs directory changed.
    TaskFileChanged {
        project_id: String,
        path: std::path::PathBuf,
    },
    /// An explicit CLI-driven request to (re-)generate an artifact.
    Explicit {
        project_id: String,
        subject: String,
    },
}

impl PrismEvent {
    /// The [`EventKey`] this event serializes against.
    pub fn key(&self) -> EventKey {
        match self {
            PrismEvent::BoardTaskMoved { project_id, board_id, .. } => {
                EventKey::new(project_id, board_id)
            }
            PrismEvent::BoardTaskCreated { project_id, board_id } => {
                EventKey::new(project_id, board_id)
            }
            PrismEvent::BoardTaskDeleted { project_id, board_id } => {
                EventKey::new(project_id, board_id)
            }
            PrismEvent::TaskFileChanged { project_id, path } => {
                EventKey::new(project_id, path.display().to_string())
            }
            PrismEvent::Explicit { project_id, subject } => EventKey::new(project_id, subject),
        }
    }

    /// `true` for the `any -> in-progress` transition that triggers a
    /// current-task briefing.
    pub fn is_moved_to_in_progress(&self) -> bool {
        matches!(
            self,
            PrismEvent::BoardTaskMoved { to_column, .. } if to_column == "in-progress"
        )
    }

    /// `true` for the `any -> done` transition that requests memory capture.
    pub fn is_moved_to_done(&self) -> bool {
        matches!(
            self,
            PrismEvent::BoardTaskMoved { to_column, .. } if to_column == "done"
        )
    }
}

/// A [`PrismEvent`] tagged with a unique id, its enqueue time, and the
/// generation number used for per-key supersession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique id, primarily for log correlation.
    pub id: Uuid,
    /// The event payload.
    pub event: PrismEvent,
    /// When this event was accepted into the queue.
    pub received_at: DateTime<Utc>,
    /// Monotonically increasing per-key sequence number, assigned at
    /// enqueue time. A handler only commits its artifact if its generation
    /// is still the latest known for its key when it finishes.
    pub generation: u64,
}

impl EventEnvelope {
    /// Wrap `event` with a freshly generated id and the given generation.
    pub fn new(event: PrismEvent, generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            received_at: Utc::now(),
            generation,
        }
    }

    /// The key this envelope serializes against.
    pub fn key(&self) -> EventKey {
        self.event.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_task_moved_keys_on_project_and_board_id() {
        let event = PrismEvent::BoardTaskMoved {
            project_id: "proj".into(),
            board_id: "b-42".into(),
            from_column: "ready".into(),
            to_column: "in-progress".into(),
        };
        assert_eq!(event.key(), EventKey::new("proj", "b-42"));
        assert!(event.is_moved_to_in_progress());
        assert!(!event.is_moved_to_done());
    }

    #[test]
    fn task_file_changed_keys_on_path() {
        let event = PrismEvent::TaskFileChanged {
            project_id: "proj".into(),
            path: "/specs/tasks.md".into(),
        };
        assert_eq!(event.key().subject, "/specs/tasks.md");
    }
}
