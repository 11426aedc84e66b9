//! Durable event log, backed by SQLite.
//!
//! The Event Router's correctness does not depend on this log — handlers
//! are idempotent on their artifacts and the in-memory [`super::worker::EventQueue`]
//! is the thing that actually drives dispatch. This log exists for restart
//! diagnostics ("what did we receive and how did it resolve") and is
//! intentionally best-effort: the spec treats events not yet acknowledged at
//! restart as lost, and handlers must tolerate that.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::types::EventEnvelope;
use crate::errors::{PrismError, Result};

/// How an event's handler ultimately resolved, recorded for operator
/// visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The handler completed and its write (if any) was committed.
    Completed,
    /// The handler's write was skipped because a newer event for the same
    /// key had already superseded it.
    Superseded,
    /// The handler returned an error.
    Failed,
    /// The handler was cancelled before completion.
    Cancelled,
}

impl EventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Completed => "completed",
            EventOutcome::Superseded => "superseded",
            EventOutcome::Failed => "failed",
            EventOutcome::Cancelled => "cancelled",
        }
    }
}

/// Append-only durable record of received events and their resolution.
pub struct EventLog {
    pool: SqlitePool,
}

impl EventLog {
    /// Open (creating if absent) a SQLite-backed event log at `path`, or
    /// `:memory:` for an ephemeral log used in tests.
    pub async fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", parent.display())))?;
            }
        }
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("failed to open event log: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                generation INTEGER NOT NULL,
                payload TEXT NOT NULL,
                received_at TEXT NOT NULL,
                outcome TEXT,
                resolved_at TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| PrismError::InvariantViolation(format!("failed to create events table: {e}")))?;

        Ok(Self { pool })
    }

    /// Record an event as received, before dispatch.
    pub async fn record_received(&self, envelope: &EventEnvelope) -> Result<()> {
        let payload = serde_json::to_string(&envelope.event)
            .map_err(|e| PrismError::InvalidInput(format!("failed to serialize event: {e}")))?;
        let key = envelope.key();

        sqlx::query(
            "INSERT OR REPLACE INTO events (id, project_id, subject, generation, payload, received_at, outcome, resolved_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL)",
        )
        .bind(envelope.id.to_string())
        .bind(&key.project_id)
        .bind(&key.subject)
        .bind(envelope.generation as i64)
        .bind(payload)
        .bind(envelope.received_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PrismError::ExternalUnavailable(format!("failed to record event: {e}")))?;

        Ok(())
    }

    /// Record how an event's handler resolved.
    pub async fn record_outcome(&self, envelope: &EventEnvelope, outcome: EventOutcome) -> Result<()> {
        sqlx::query("UPDATE events SET outcome = ?1, resolved_at = ?2 WHERE id = ?3")
            .bind(outcome.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(envelope.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("failed to record outcome: {e}")))?;
        Ok(())
    }

    /// Events received but never resolved — candidates for "was this lost
    /// at restart" diagnostics. Never replayed automatically; the spec
    /// treats unacknowledged events as best-effort-lost.
    pub async fn unresolved(&self) -> Result<Vec<(String, String, String)>> {
        let rows = sqlx::query("SELECT id, project_id, subject FROM events WHERE outcome IS NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("failed to query event log: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("project_id"), row.get("subject")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_queue::types::PrismEvent;

    #[tokio::test]
    async fn records_receipt_and_outcome() {
        let log = EventLog::open(":memory:").await.unwrap();
        let envelope = EventEnvelope::new(
            PrismEvent::Explicit { project_id: "proj".into(), subject: "task-1".into() },
            1,
        );
        log.record_received(&envelope).await.unwrap();
        assert_eq!(log.unresolved().await.unwrap().len(), 1);

        log.record_outcome(&envelope, EventOutcome::Completed).await.unwrap();
        assert!(log.unresolved().await.unwrap().is_empty());
    }
}
