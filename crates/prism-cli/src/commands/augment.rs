use std::path::Path;

use anyhow::Result;
use colored::*;
use prism_config::AppContext;
use prism_core::errors::PrismError;
use prism_core::project::Project;
use prism_core::task_augmenter::TaskAugmenter;

/// `prism augment <path>`: re-run the Task Augmenter against a task
/// document, writing its `.prism.md` sibling.
pub fn execute(project_root: &Path, path: &Path, force: bool) -> Result<()> {
    let ctx = AppContext::open(project_root)?;
    let stack = Project::open(project_root).map(|p| p.manifest.stack).unwrap_or_default();

    let augmenter = TaskAugmenter::new(&ctx.store, ctx.config.injector.per_task_budget_tokens);
    match augmenter.augment(path, &stack, force) {
        Ok(output) => {
            println!("{} wrote {}", "✓".green(), output.display());
            Ok(())
        }
        Err(PrismError::Conflict(msg)) => {
            anyhow::bail!("{msg}\nrun with --force to overwrite the hand-edited output");
        }
        Err(e) => Err(e.into()),
    }
}
