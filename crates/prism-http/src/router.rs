//! The Event Router: wires the webhook endpoint, the file watcher, and
//! explicit CLI invocations to a shared [`WorkerPool`], and implements the
//! downstream actions the spec names for each transition:
//!
//! - `any -> in-progress`: write `.prism/current-task.md`.
//! - `any -> done`: log a memory-capture-requested event (its handling is
//!   out of scope for this core).
//! - a watched task-file change: re-run the Task Augmenter on that file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use prism_board::BoardClient;
use prism_config::AppContext;
use prism_core::errors::{PrismError, Result};
use prism_core::event_queue::{
    EventEnvelope, EventHandler, EventQueue, HandlerContext, PrismEvent, WorkerPool,
};
use prism_core::injector::{ContextInjector, InjectorConfig};
use prism_core::project::Project;
use prism_core::task_augmenter::TaskAugmenter;
use tracing::{info, warn};

use crate::server::{HttpServer, HttpServerConfig};
use crate::watcher::FileWatcher;

/// Number of candidate Skills the current-task briefing ranks against
/// before the Injector's budget trims the list down.
const BRIEFING_CANDIDATE_LIMIT: usize = 50;

const DEFINITION_OF_DONE: &str = "## Definition of Done\n\n\
- [ ] Code compiles and the existing test suite passes\n\
- [ ] New or changed behavior is covered by tests\n\
- [ ] Public-facing documentation is updated where relevant\n\
- [ ] No unreviewed `TODO`s remain in changed code\n";

/// Dispatches every queued event to the right downstream action.
pub struct PrismEventHandler {
    ctx: Arc<AppContext>,
}

impl PrismEventHandler {
    /// Build a handler that acts against `ctx`'s Skill Store, board client,
    /// and project root.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    fn project_stack(&self) -> Vec<String> {
        Project::open(&self.ctx.project_root)
            .map(|p| p.manifest.stack)
            .unwrap_or_default()
    }

    async fn generate_current_task_briefing(
        &self,
        project_id: &str,
        board_id: &str,
        envelope: &EventEnvelope,
        handler_ctx: &HandlerContext,
    ) -> Result<()> {
        let board_client = self.ctx.board_client.as_ref().ok_or_else(|| {
            PrismError::ConfigurationMissing("no board client configured, cannot fetch task".into())
        })?;

        let task = board_client.get_task(board_id).await?;
        let stack = self.project_stack();

        let query = format!("{} {}", task.title, task.body);
        let ranked = self.ctx.store.search(&query, &stack, BRIEFING_CANDIDATE_LIMIT)?;
        let mut skills = Vec::with_capacity(ranked.len());
        for entry in &ranked {
            skills.push(self.ctx.store.get(&entry.skill_id)?);
        }

        let injector = ContextInjector::new(InjectorConfig {
            budget_tokens: self.ctx.config.injector.budget_tokens,
        });
        let packed = injector.pack(&ranked, &skills, &query);

        if handler_ctx.is_superseded(envelope) {
            info!(project_id, board_id, "newer event superseded this briefing before write, skipping");
            return Ok(());
        }

        let content = render_briefing(board_id, &task.title, &task.body, &packed.content);

        let project = Project::open(&self.ctx.project_root)?;
        let path = project.artifact_path("current-task.md");
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &content)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to rename {} to {}: {e}", tmp_path.display(), path.display())))?;

        for skill_id in &packed.included_skill_ids {
            self.ctx.store.increment_reuse(skill_id)?;
        }

        info!(project_id, board_id, path = %path.display(), "wrote current-task briefing");
        Ok(())
    }

    fn reaugment_task_file(&self, project_id: &str, path: &Path) -> Result<()> {
        let stack = self.project_stack();
        let augmenter = TaskAugmenter::new(&self.ctx.store, self.ctx.config.injector.per_task_budget_tokens);
        let output = augmenter.augment(path, &stack, false)?;
        info!(project_id, path = %path.display(), output = %output.display(), "re-augmented task file");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for PrismEventHandler {
    async fn handle(&self, envelope: &EventEnvelope, handler_ctx: &HandlerContext) -> Result<()> {
        match &envelope.event {
            PrismEvent::BoardTaskMoved { project_id, board_id, to_column, .. }
                if to_column == "in-progress" =>
            {
                self.generate_current_task_briefing(project_id, board_id, envelope, handler_ctx)
                    .await
            }
            PrismEvent::BoardTaskMoved { project_id, board_id, to_column, .. } if to_column == "done" => {
                info!(project_id, board_id, "memory-capture requested (handling out of this core's scope)");
                Ok(())
            }
            PrismEvent::BoardTaskMoved { project_id, board_id, to_column, .. } => {
                tracing::debug!(project_id, board_id, to_column, "ignoring uninteresting column transition");
                Ok(())
            }
            PrismEvent::BoardTaskCreated { project_id, board_id }
            | PrismEvent::BoardTaskDeleted { project_id, board_id } => {
                tracing::debug!(project_id, board_id, "board task lifecycle event noted, no artifact action");
                Ok(())
            }
            PrismEvent::TaskFileChanged { project_id, path } => {
                self.reaugment_task_file(project_id, path)
            }
            PrismEvent::Explicit { project_id, subject } => {
                tracing::debug!(project_id, subject, "explicit invocation dispatched by caller, nothing to do here");
                Ok(())
            }
        }
    }
}

fn render_briefing(board_id: &str, title: &str, body: &str, ranked_skills_section: &str) -> String {
    let criteria = extract_acceptance_criteria(body);
    let criteria_block = if criteria.is_empty() {
        "(none listed)\n".to_string()
    } else {
        criteria.iter().map(|c| format!("{c}\n")).collect::<String>()
    };

    format!(
        "<!-- Generated by PRISM. Do not edit by hand; regenerated on every in-progress transition. -->\n\
         <!-- generated_at: {} -->\n\
         # Current Task: {title}\n\n\
         **Board ID:** {board_id}\n\n\
         ## Description\n\n{body}\n\n\
         ## Acceptance Criteria\n\n{criteria_block}\n\
         {ranked_skills_section}\n\
         {DEFINITION_OF_DONE}\n\
         ## Output\n\n\
         _(to be completed by the agent)_\n",
        Local::now().to_rfc3339(),
    )
}

/// Lines in a board task's body written as Markdown checkboxes
/// (`- [ ] ...` / `- [x] ...`), taken verbatim as acceptance criteria.
fn extract_acceptance_criteria(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("- [ ]") || line.starts_with("- [x]") || line.starts_with("- [X]"))
        .map(str::to_string)
        .collect()
}

/// Configuration for a running Event Router.
#[derive(Debug, Clone)]
pub struct EventRouterConfig {
    /// Webhook listener settings.
    pub http: HttpServerConfig,
    /// Directory the file watcher observes recursively for task-file changes.
    pub specs_dir: std::path::PathBuf,
    /// Bounded webhook/file-watch queue capacity.
    pub queue_capacity: usize,
    /// Number of concurrent workers draining the queue.
    pub worker_concurrency: usize,
    /// Project id tagged onto file-watch events (the board's own events
    /// already carry their own `project_id`).
    pub project_id: String,
}

impl EventRouterConfig {
    /// Defaults for `project_id`'s watcher/webhook, rooted at `project_root`.
    pub fn new(project_id: impl Into<String>, project_root: &Path) -> Self {
        Self {
            http: HttpServerConfig::default(),
            specs_dir: project_root.join("specs"),
            queue_capacity: 256,
            worker_concurrency: 4,
            project_id: project_id.into(),
        }
    }
}

/// The running Event Router: webhook server, file watcher, and worker pool,
/// all sharing one [`EventQueue`].
pub struct EventRouter {
    queue: EventQueue,
    watcher: Option<FileWatcher>,
    worker_pool: WorkerPool,
}

impl EventRouter {
    /// Spawn the watcher and worker pool (but not the HTTP listener — call
    /// [`EventRouter::serve_http`] separately so callers can choose when to
    /// start accepting webhook deliveries).
    pub fn spawn(ctx: Arc<AppContext>, config: &EventRouterConfig) -> Self {
        let (queue, receiver) = EventQueue::bounded(config.queue_capacity);
        let handler = Arc::new(PrismEventHandler::new(ctx));
        let worker_pool = WorkerPool::spawn(receiver, queue.generations(), handler, config.worker_concurrency);

        let watcher = if config.specs_dir.exists() {
            match FileWatcher::spawn(config.specs_dir.clone(), config.project_id.clone(), queue.clone()) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, dir = %config.specs_dir.display(), "failed to start file watcher");
                    None
                }
            }
        } else {
            warn!(dir = %config.specs_dir.display(), "specs directory does not exist, file watching disabled");
            None
        };

        Self { queue, watcher, worker_pool }
    }

    /// The enqueue handle new webhook deliveries and explicit CLI
    /// invocations should use.
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    /// Run the webhook listener until the process receives a shutdown
    /// signal, then stop the watcher and drain the worker pool.
    pub async fn serve_http(self, http_config: HttpServerConfig) -> anyhow::Result<()> {
        let server = HttpServer::new(http_config, self.queue.clone());
        tokio::select! {
            result = server.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }
        self.shutdown().await;
        Ok(())
    }

    /// Stop the file watcher and wait for in-flight handlers to drain,
    /// cancelling anything still running after a grace period.
    pub async fn shutdown(self) {
        if let Some(watcher) = self.watcher {
            watcher.shutdown().await;
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.worker_pool.shutdown()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_checkbox_lines_only() {
        let body = "Some description.\n- [ ] first criterion\n- [x] second, already done\nnot a bullet\n";
        let criteria = extract_acceptance_criteria(body);
        assert_eq!(criteria, vec!["- [ ] first criterion", "- [x] second, already done"]);
    }

    #[test]
    fn no_criteria_yields_empty_vec() {
        assert!(extract_acceptance_criteria("just prose, no checkboxes").is_empty());
    }
}
