use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::*;
use prism_core::skill::{self, SkillStatus, SkillType};
use prism_core::store::{SkillFilter, SkillStore, StatusFilter};

fn open_store(project_root: &Path) -> Result<SkillStore> {
    SkillStore::open(project_root.join("memory")).context("failed to open skill store")
}

fn parse_skill_type(raw: &str) -> Result<SkillType> {
    match raw.to_lowercase().as_str() {
        "skill" => Ok(SkillType::Skill),
        "pattern" => Ok(SkillType::Pattern),
        "gotcha" => Ok(SkillType::Gotcha),
        "decision" => Ok(SkillType::Decision),
        other => anyhow::bail!("unknown skill type {other:?} (expected skill, pattern, gotcha, or decision)"),
    }
}

/// `prism skill put <path>`: parse a Skill file and store it.
pub fn put(project_root: &Path, path: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = skill::parse_skill(&content)?;
    let skill_id = parsed.frontmatter.skill_id.clone();

    let store = open_store(project_root)?;
    store.put(parsed)?;

    println!("{} stored skill {}", "✓".green(), skill_id.cyan());
    Ok(())
}

/// `prism skill get <id>`: print one Skill's rendered form.
pub fn get(project_root: &Path, id: &str) -> Result<()> {
    let store = open_store(project_root)?;
    let skill = store.get(id)?;
    print!("{}", skill.render()?);
    Ok(())
}

/// `prism skill list`: list Skills matching an optional type/tag/status filter.
pub fn list(project_root: &Path, skill_type: Option<&str>, tag: Option<&str>, all: bool) -> Result<()> {
    let store = open_store(project_root)?;

    let mut filter = if all { SkillFilter::all() } else { SkillFilter::new() };
    if let Some(raw) = skill_type {
        filter.skill_type = Some(parse_skill_type(raw)?);
    }
    filter.tag = tag.map(str::to_string);

    let skills = store.list(&filter)?;
    if skills.is_empty() {
        println!("{}", "no skills matched".dimmed());
        return Ok(());
    }

    for skill in &skills {
        let status_label = match skill.frontmatter.status {
            SkillStatus::Active => "active".green(),
            SkillStatus::Deprecated => "deprecated".yellow(),
            SkillStatus::Conflicted => "conflicted".red(),
            SkillStatus::NeedsReview => "needs-review".yellow(),
        };
        println!(
            "{:<30} {:<10} [{}] reuse={} tags={}",
            skill.frontmatter.skill_id.cyan(),
            format!("{:?}", skill.frontmatter.skill_type).to_lowercase(),
            status_label,
            skill.frontmatter.reuse_count,
            skill.frontmatter.domain_tags.join(","),
        );
    }
    Ok(())
}

/// `prism skill search <query>`: rank Skills against a free-text query.
pub fn search(project_root: &Path, query: &str, limit: usize) -> Result<()> {
    let store = open_store(project_root)?;
    let ranked = store.search(query, &[], limit)?;

    if ranked.is_empty() {
        println!("{}", "no matches".dimmed());
        return Ok(());
    }

    for entry in &ranked {
        println!(
            "{:<30} score={:.3} (lex={:.2} sem={:.2} tag={:.2} reuse={:.2} recency={:.2})",
            entry.skill_id.cyan(),
            entry.combined_score,
            entry.scores.lex,
            entry.scores.sem,
            entry.scores.tag,
            entry.scores.reuse,
            entry.scores.recency,
        );
    }
    Ok(())
}
