use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use prism_config::AppContext;
use prism_core::project::Project;

/// Initialize a PRISM project: `.prism/project.yaml`, `.prism/PRISM.md`,
/// `.prism/AGENTS.md`, and an empty `memory/` Skill Store, all created
/// fresh.
pub fn execute(project_root: &Path, name: Option<&str>) -> Result<()> {
    let name = name.map(str::to_string).unwrap_or_else(|| {
        project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("prism-project")
            .to_string()
    });

    let project = Project::init(project_root, &name).context("failed to initialize project")?;
    let ctx = AppContext::open(project_root).context("failed to open skill store")?;

    println!("{} initialized project {} at {}", "✓".green(), project.manifest.name.cyan(), project_root.display());
    println!("  {} {}", "manifest:".dimmed(), project.artifact_path("project.yaml").display());
    println!("  {} {}", "briefing:".dimmed(), project.artifact_path("PRISM.md").display());
    println!("  {} {}", "agents:".dimmed(), project.artifact_path("AGENTS.md").display());
    println!("  {} {}", "memory:".dimmed(), ctx.store.root().display());
    Ok(())
}
