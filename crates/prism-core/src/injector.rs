//! The Context Injector: packs ranked Skills into a token-budgeted Markdown
//! artifact.
//!
//! Token counts are estimated, never measured by a real tokenizer: four
//! characters of rendered Markdown are assumed to cost one token. This is
//! deliberately coarse — good enough to keep an artifact under a budget
//! without pulling in a model-specific tokenizer dependency that would tie
//! the Injector to one LLM vendor's encoding.

use chrono::Local;

use crate::errors::{PrismError, Result};
use crate::skill::Skill;
use crate::types::{Artifact, ArtifactKind, RankedEntry};

/// Characters of rendered Markdown assumed to cost one token.
const CHARS_PER_TOKEN: usize = 4;

/// A Skill always included if it ranked at all, regardless of remaining
/// budget, so long as packing it doesn't blow the budget by itself: below
/// this fraction of the total budget, "ranked" implies "included."
const ALWAYS_INCLUDE_FRACTION: f32 = 0.20;

/// A Skill always skipped once it alone would exceed the full budget.
const ALWAYS_SKIP_FRACTION: f32 = 1.0;

/// Configuration for a single injection run.
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Total token budget for the generated artifact.
    pub budget_tokens: usize,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self { budget_tokens: 4000 }
    }
}

/// Packs ranked Skills into a deterministic Markdown artifact.
pub struct ContextInjector {
    config: InjectorConfig,
}

impl ContextInjector {
    /// Build an Injector with the given config.
    pub fn new(config: InjectorConfig) -> Self {
        Self { config }
    }

    /// Pack `ranked` entries (already ordered by the Ranker) using the
    /// corresponding `skills`, producing a Markdown [`Artifact`].
    ///
    /// `skills` must contain every `skill_id` referenced in `ranked`;
    /// entries whose skill is missing are silently skipped (treated as
    /// stale ranker output against a store that has since changed).
    pub fn pack(&self, ranked: &[RankedEntry], skills: &[Skill], query_summary: &str) -> Artifact {
        let budget = self.config.budget_tokens;
        let mut body = String::new();
        let mut included = Vec::new();
        let mut skipped = Vec::new();
        let mut used_tokens = 0usize;

        for entry in ranked {
            let Some(skill) = skills.iter().find(|s| s.frontmatter.skill_id == entry.skill_id) else {
                continue;
            };

            let section = render_section(skill);
            let section_tokens = estimate_tokens(&section);

            let always_include = section_tokens as f32 <= budget as f32 * ALWAYS_INCLUDE_FRACTION;
            let always_skip = section_tokens as f32 > budget as f32 * ALWAYS_SKIP_FRACTION;
            let fits = used_tokens + section_tokens <= budget;

            if always_skip {
                skipped.push(entry.skill_id.clone());
            } else if fits || always_include {
                body.push_str(&section);
                used_tokens += section_tokens;
                included.push(entry.skill_id.clone());
            } else {
                skipped.push(entry.skill_id.clone());
            }
        }

        let banner = render_banner(query_summary, budget, used_tokens, included.len(), skipped.len());
        let content = format!("{banner}\n{body}");

        Artifact {
            kind: ArtifactKind::InjectedContext,
            content,
            included_skill_ids: included,
            skipped_skill_ids: skipped,
            budget_tokens: budget,
            used_tokens,
        }
    }

    /// Write an [`Artifact`] to `path` via write-temp-then-rename.
    pub fn write(&self, artifact: &Artifact, path: &std::path::Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", dir.display())))?;
        }
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &artifact.content)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to rename {} to {}: {e}", tmp_path.display(), path.display())))?;
        Ok(())
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

fn render_banner(query_summary: &str, budget: usize, used: usize, included: usize, skipped: usize) -> String {
    format!(
        "<!-- Generated by PRISM. Do not edit by hand; this file is regenerated on every injection run. -->\n\
         <!-- generated_at: {} -->\n\
         # Injected Context\n\n\
         Query: {query_summary}\n\
         Budget: {used}/{budget} tokens (est.) · {included} included · {skipped} skipped\n",
        Local::now().to_rfc3339(),
    )
}

fn render_section(skill: &Skill) -> String {
    format!(
        "\n## {}\n\n- type: {:?}\n- skill_id: {}\n- domain_tags: {}\n\n{}\n",
        skill.title(),
        skill.frontmatter.skill_type,
        skill.frontmatter.skill_id,
        skill.frontmatter.domain_tags.join(", "),
        skill.body.trim_end()
    )
}
