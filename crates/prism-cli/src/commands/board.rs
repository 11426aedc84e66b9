use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use prism_config::AppContext;
use prism_core::errors::PrismError;
use prism_core::project::Project;
use prism_core::task_augmenter::parse_task_document;

/// `prism board sync <tasks> --board-id <id>`: create a board task for
/// every internal task not already mapped.
pub async fn sync(project_root: &Path, tasks: &Path, board_id: &str, dry_run: bool) -> Result<()> {
    let ctx = AppContext::open(project_root).context("failed to open project")?;
    let board_client = ctx.board_client.as_ref().ok_or_else(|| {
        PrismError::ConfigurationMissing(
            "no board configured (set [board] base_url and api_token_env in prism.toml)".into(),
        )
    })?;

    let content = std::fs::read_to_string(tasks).with_context(|| format!("failed to read {}", tasks.display()))?;
    let doc = parse_task_document(&content)?;

    let mut project = Project::open(project_root).context("failed to open project (run `prism init` first)")?;
    let report = prism_board::sync_tasks(&mut project, &doc, board_client.as_ref(), board_id, dry_run).await?;

    if dry_run {
        println!("{}", "plan (dry run, nothing created):".yellow());
        for planned in &report.created {
            println!("  {} {}", "+".green(), planned.task_key);
        }
    } else {
        for planned in &report.created {
            println!("{} created {} ({})", "✓".green(), planned.task_key.cyan(), planned.title);
        }
    }
    println!("{} already mapped, skipped", report.skipped_existing.len());
    Ok(())
}
