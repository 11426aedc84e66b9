use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use prism_config::AppContext;
use prism_core::injector::{ContextInjector, InjectorConfig};
use prism_core::project::Project;

/// `prism inject`: rank Skills against a query (default: the project's
/// stack tags) and pack them into `.prism/injected-context.md`.
pub fn execute(project_root: &Path, query: Option<&str>, extra_tags: &[String], budget: Option<usize>) -> Result<()> {
    let ctx = AppContext::open(project_root).context("failed to open project")?;
    let project = Project::open(project_root).context("failed to open project (run `prism init` first)")?;

    let query = query.map(str::to_string).unwrap_or_else(|| project.manifest.stack.join(" "));
    let budget_tokens = budget.unwrap_or(ctx.config.injector.budget_tokens);

    let mut domain_tags = project.manifest.stack.clone();
    domain_tags.extend(extra_tags.iter().cloned());

    let ranked = ctx.store.search(&query, &domain_tags, 50)?;
    let mut skills = Vec::with_capacity(ranked.len());
    for entry in &ranked {
        skills.push(ctx.store.get(&entry.skill_id)?);
    }

    let injector = ContextInjector::new(InjectorConfig { budget_tokens });
    let artifact = injector.pack(&ranked, &skills, &query);

    let path = project.artifact_path("injected-context.md");
    injector.write(&artifact, &path)?;

    for skill_id in &artifact.included_skill_ids {
        ctx.store.increment_reuse(skill_id)?;
    }

    println!(
        "{} wrote {} ({} included, {} skipped, {}/{} tokens)",
        "✓".green(),
        path.display(),
        artifact.included_skill_ids.len(),
        artifact.skipped_skill_ids.len(),
        artifact.used_tokens,
        artifact.budget_tokens,
    );
    Ok(())
}
