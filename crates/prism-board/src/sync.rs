//! `SyncTasks`: idempotently create board tasks for every internal task not
//! already in the project's board task map.

use std::time::Duration;

use prism_core::errors::Result;
use prism_core::project::Project;
use prism_core::task_augmenter::TaskDocument;
use tracing::info;

use crate::client::BoardClient;

const TASK_MAP_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// One task the sync plan would create (or, in dry-run, would have created).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    /// `"<epic>/task-<n>"`.
    pub task_key: String,
    /// The task's title, passed through to `CreateTask`.
    pub title: String,
}

/// What a `SyncTasks` run did (or, in dry-run, would do).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Tasks created this run (empty in dry-run mode).
    pub created: Vec<PlannedCreate>,
    /// Tasks already present in the task map, left untouched.
    pub skipped_existing: Vec<String>,
}

/// Create a board task for every task in `doc` whose key is not already in
/// `project`'s task map, recording each new mapping as it's created so a
/// failure partway through leaves already-created tasks correctly mapped.
///
/// `dry_run = true` computes and returns the plan without calling the board
/// or mutating the map. Running this twice against an unchanged board and
/// task list is a no-op the second time: every key is already mapped.
pub async fn sync_tasks(
    project: &mut Project,
    doc: &TaskDocument,
    client: &dyn BoardClient,
    project_board_id: &str,
    dry_run: bool,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    let mut pending = Vec::new();
    for (epic_name, task) in doc.tasks() {
        let key = TaskDocument::task_key(epic_name, task);
        if project.board_id_for(&key).is_some() {
            report.skipped_existing.push(key);
            continue;
        }
        pending.push((key, task.title.clone(), task.body.clone()));
    }

    if dry_run {
        report.created = pending
            .into_iter()
            .map(|(task_key, title, _)| PlannedCreate { task_key, title })
            .collect();
        return Ok(report);
    }

    if pending.is_empty() {
        return Ok(report);
    }

    let _lock = crate::task_map::TaskMapLock::acquire(&project.root, TASK_MAP_LOCK_TIMEOUT).await?;

    for (task_key, title, body) in pending {
        let board_id = client.create_task(project_board_id, &title, &body).await?;
        project.record_board_id(task_key.clone(), board_id.clone())?;
        info!(task_key = %task_key, board_id = %board_id, "created board task");
        report.created.push(PlannedCreate { task_key, title });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prism_core::errors::PrismError;
    use prism_core::task_augmenter::parse_task_document;
    use std::sync::Mutex;

    struct StubClient {
        next_id: Mutex<u32>,
        calls: Mutex<Vec<String>>,
    }

    impl StubClient {
        fn new() -> Self {
            Self { next_id: Mutex::new(0), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl BoardClient for StubClient {
        async fn list_tasks(&self, _project_id: &str) -> Result<Vec<crate::types::BoardTask>> {
            Ok(Vec::new())
        }

        async fn create_task(&self, _project_id: &str, title: &str, _body: &str) -> Result<String> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            self.calls.lock().unwrap().push(title.to_string());
            Ok(format!("b-{next}"))
        }

        async fn get_task(&self, _board_id: &str) -> Result<crate::types::BoardTask> {
            Err(PrismError::NotFound("stub".into()))
        }
    }

    const SAMPLE: &str = "## Epic: Billing\n### Task 1: Add invoice export\nExport invoices.\n";

    #[tokio::test]
    async fn creates_only_unmapped_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::init(dir.path(), "demo").unwrap();
        let doc = parse_task_document(SAMPLE).unwrap();
        let client = StubClient::new();

        let report = sync_tasks(&mut project, &doc, &client, "proj", false).await.unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(project.board_id_for("Billing/task-1"), Some("b-1"));
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::init(dir.path(), "demo").unwrap();
        let doc = parse_task_document(SAMPLE).unwrap();
        let client = StubClient::new();

        sync_tasks(&mut project, &doc, &client, "proj", false).await.unwrap();
        let second = sync_tasks(&mut project, &doc, &client, "proj", false).await.unwrap();

        assert!(second.created.is_empty());
        assert_eq!(second.skipped_existing, vec!["Billing/task-1".to_string()]);
        assert_eq!(*client.next_id.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn dry_run_reports_plan_without_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::init(dir.path(), "demo").unwrap();
        let doc = parse_task_document(SAMPLE).unwrap();
        let client = StubClient::new();

        let report = sync_tasks(&mut project, &doc, &client, "proj", true).await.unwrap();
        assert_eq!(report.created.len(), 1);
        assert!(project.board_id_for("Billing/task-1").is_none());
        assert_eq!(*client.next_id.lock().unwrap(), 0);
    }
}
