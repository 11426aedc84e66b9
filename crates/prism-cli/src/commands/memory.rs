use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use prism_config::AppContext;
use prism_core::errors::PrismError;

fn memory_sync(project_root: &Path) -> Result<std::sync::Arc<prism_core::memory_sync::MemorySync>> {
    let ctx = AppContext::open(project_root).context("failed to open project")?;
    ctx.memory_sync.clone().ok_or_else(|| {
        PrismError::ConfigurationMissing(format!(
            "{} is not a git repository; run `git init` inside it to enable memory sync",
            project_root.join("memory").display()
        ))
        .into()
    })
}

fn author() -> (String, String) {
    let name = std::env::var("PRISM_GIT_AUTHOR_NAME").unwrap_or_else(|_| "PRISM".to_string());
    let email = std::env::var("PRISM_GIT_AUTHOR_EMAIL").unwrap_or_else(|_| "prism@localhost".to_string());
    (name, email)
}

/// `prism memory status`: report pending changes in the memory directory.
pub fn status(project_root: &Path) -> Result<()> {
    let sync = memory_sync(project_root)?;
    let status = sync.status()?;

    if status.is_clean {
        println!("{}", "memory directory clean".green());
        return Ok(());
    }
    for path in &status.modified {
        println!("  {} {path}", "modified:".yellow());
    }
    for path in &status.untracked {
        println!("  {} {path}", "untracked:".yellow());
    }
    Ok(())
}

/// `prism memory commit <summary>`: stage and commit pending changes.
pub fn commit(project_root: &Path, summary: &str) -> Result<()> {
    let sync = memory_sync(project_root)?;
    let (name, email) = author();
    match sync.commit_all(&name, &email, summary)? {
        Some(oid) => println!("{} committed {oid}", "✓".green()),
        None => println!("{}", "nothing to commit".dimmed()),
    }
    Ok(())
}

/// `prism memory push [remote]`: push the memory directory's current branch.
pub async fn push(project_root: &Path, remote: &str) -> Result<()> {
    let sync = memory_sync(project_root)?;
    sync.push(remote).await?;
    println!("{} pushed to {remote}", "✓".green());
    Ok(())
}

/// `prism memory pull [remote]`: fetch and fast-forward the current branch.
pub async fn pull(project_root: &Path, remote: &str) -> Result<()> {
    let sync = memory_sync(project_root)?;
    sync.pull(remote).await?;
    println!("{} pulled from {remote}", "✓".green());
    Ok(())
}
