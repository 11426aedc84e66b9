use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use prism_core::evaluator::{Evaluator, Verdict};
use prism_core::skill::{self, SkillStatus};
use prism_core::store::SkillStore;

const EVALUATION_CONTEXT_LIMIT: usize = 10;

/// `prism evaluate <path>`: ask the Evaluator for a verdict on a candidate
/// Skill against the current Store, optionally applying it.
pub async fn execute(project_root: &Path, path: &Path, apply: bool) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let candidate = skill::parse_skill(&content)?;

    let store = SkillStore::open(project_root.join("memory")).context("failed to open skill store")?;
    let query = format!("{} {}", candidate.title(), candidate.key_insight());
    let ranked = store.search(&query, &candidate.frontmatter.domain_tags, EVALUATION_CONTEXT_LIMIT)?;
    let mut context = Vec::with_capacity(ranked.len());
    for entry in &ranked {
        context.push(store.get(&entry.skill_id)?);
    }

    let evaluator = Evaluator::from_env()?;
    let verdict = evaluator.evaluate(&candidate, &context).await?;

    println!("{} {:?}", "verdict:".cyan(), verdict);
    if !apply {
        return Ok(());
    }

    match verdict {
        Verdict::Add => {
            let skill_id = candidate.frontmatter.skill_id.clone();
            store.put(candidate)?;
            println!("{} added {}", "✓".green(), skill_id);
        }
        Verdict::Update { target_skill_id } => {
            let skill_id = candidate.frontmatter.skill_id.clone();
            store.put(candidate)?;
            println!(
                "{} stored {} as an update to {}",
                "✓".green(),
                skill_id,
                target_skill_id
            );
        }
        Verdict::Noop => {
            println!("{}", "no change: candidate is redundant with existing memory".dimmed());
        }
        Verdict::Delete { target_skill_id } => {
            let mut target = store.get(&target_skill_id)?;
            target.frontmatter.status = SkillStatus::Deprecated;
            store.put(target)?;
            println!("{} deprecated {}", "✓".green(), target_skill_id);
        }
    }
    Ok(())
}
