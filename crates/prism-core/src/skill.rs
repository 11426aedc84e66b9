//! Skill documents: a `---`-delimited YAML header plus a free-form Markdown body.
//!
//! A Skill is the primary entity PRISM stores and ranks: a reusable pattern,
//! gotcha, or decision captured once and reinjected into future agent
//! context. The on-disk file is the source of truth; everything else
//! (lexical index, vector index) is a derived cache rebuilt from these.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{PrismError, Result};

/// What kind of knowledge fragment a Skill captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    /// A reusable technique or recipe.
    Skill,
    /// A recurring structural or architectural pattern.
    Pattern,
    /// A documented pitfall to avoid repeating.
    Gotcha,
    /// A recorded architectural decision and its rationale.
    Decision,
}

impl SkillType {
    /// The directory a Skill of this type is filed under in the memory root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SkillType::Skill => "skills",
            SkillType::Pattern => "skills",
            SkillType::Gotcha => "gotchas",
            SkillType::Decision => "decisions",
        }
    }
}

/// Whether a Skill is shared across every project or scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Available to every project.
    Global,
    /// Associated with a single project (`project_origin`).
    Project,
}

/// Lifecycle state of a Skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    /// Eligible for ranking and injection.
    Active,
    /// Superseded; excluded from ranking but kept for history.
    Deprecated,
    /// Known to contradict another Skill; excluded from ranking.
    Conflicted,
    /// Flagged by the Evaluator or an operator for manual review.
    NeedsReview,
}

/// Who last vouched for a Skill's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifiedBy {
    /// A human reviewed and approved it.
    Human,
    /// Only an agent (e.g. the Evaluator) has vouched for it.
    Agent,
}

/// The structured header of a Skill document.
///
/// Unknown keys present in the source file are preserved in `extra` and
/// re-emitted verbatim on the next write, so a hand-edited header never
/// loses fields PRISM doesn't yet model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFrontmatter {
    /// Stable kebab-case identifier, globally unique.
    pub skill_id: String,
    /// What kind of knowledge fragment this is.
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    /// Non-empty set of short lowercase tags.
    pub domain_tags: Vec<String>,
    /// Global or project-scoped.
    pub scope: Scope,
    /// Technology tags, possibly empty.
    #[serde(default)]
    pub stack_context: Vec<String>,
    /// Date of first entry.
    pub created: NaiveDate,
    /// Date of last retrieval into an injected context.
    pub last_used: NaiveDate,
    /// Incremented each time the Skill is emitted into an artifact.
    pub reuse_count: u64,
    /// Name of the project that contributed it, if any.
    #[serde(default)]
    pub project_origin: Option<String>,
    /// Lifecycle state.
    pub status: SkillStatus,
    /// Who last vouched for this Skill's accuracy.
    pub verified_by: VerifiedBy,
    /// Unrecognized header keys, preserved verbatim across rewrites.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl SkillFrontmatter {
    fn validate(&self) -> Result<()> {
        if self.domain_tags.is_empty() {
            return Err(PrismError::InvalidInput(
                "domain_tags must be non-empty".into(),
            ));
        }
        if self.last_used < self.created {
            return Err(PrismError::InvalidInput(
                "last_used must not precede created".into(),
            ));
        }
        Ok(())
    }
}

/// A parsed Skill: header plus body, and the title/key_insight derived from
/// the body for indexing.
#[derive(Debug, Clone)]
pub struct Skill {
    /// The structured header.
    pub frontmatter: SkillFrontmatter,
    /// The raw Markdown body, verbatim (no trailing-newline normalization
    /// beyond what `parse` applies on read).
    pub body: String,
}

impl Skill {
    /// Construct a Skill, validating the header invariants.
    pub fn new(frontmatter: SkillFrontmatter, body: String) -> Result<Self> {
        frontmatter.validate()?;
        Ok(Self { frontmatter, body })
    }

    /// The file name this Skill is stored under: `<skill_id>.md`.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.frontmatter.skill_id)
    }

    /// The title derived from the body's first Markdown heading, falling
    /// back to `skill_id` if the body has none.
    pub fn title(&self) -> String {
        first_heading(&self.body).unwrap_or_else(|| self.frontmatter.skill_id.clone())
    }

    /// A short indexable summary: the first non-empty paragraph of the body.
    pub fn key_insight(&self) -> String {
        first_paragraph(&self.body).unwrap_or_default()
    }

    /// Render this Skill back to its on-disk `---`-delimited form.
    pub fn render(&self) -> Result<String> {
        let header = serde_yaml::to_string(&self.frontmatter)
            .map_err(|e| PrismError::InvalidInput(format!("failed to serialize header: {e}")))?;
        Ok(format!("---\n{header}---\n\n{}", self.body.trim_end()))
    }
}

/// Parse a Skill document from its full on-disk text.
pub fn parse_skill(content: &str) -> Result<Skill> {
    let (frontmatter, body) = extract_frontmatter(content)?;
    Skill::new(frontmatter, body)
}

/// Split a document into its parsed header and raw body.
///
/// Expects the document to open with a `---` line, a YAML block, a closing
/// `---` line, and the remaining text as body.
fn extract_frontmatter(content: &str) -> Result<(SkillFrontmatter, String)> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| PrismError::InvalidInput("missing opening '---' header delimiter".into()))?;
    let rest = rest.trim_start_matches(['\r', '\n']);

    let end = rest
        .find("\n---")
        .ok_or_else(|| PrismError::InvalidInput("missing closing '---' header delimiter".into()))?;

    let header_block = &rest[..end];
    let after = &rest[end + 4..];
    let body = after.trim_start_matches(['\r', '\n']).to_string();

    let frontmatter: SkillFrontmatter = serde_yaml::from_str(header_block)
        .map_err(|e| PrismError::InvalidInput(format!("malformed header: {e}")))?;

    Ok((frontmatter, body))
}

fn first_heading(body: &str) -> Option<String> {
    use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

    let parser = Parser::new(body);
    let mut in_heading = false;
    let mut text = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) if level == HeadingLevel::H1 => {
                in_heading = true;
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_heading => {
                return Some(text.trim().to_string());
            }
            Event::Text(t) if in_heading => text.push_str(&t),
            Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }

    None
}

fn first_paragraph(body: &str) -> Option<String> {
    use pulldown_cmark::{Event, Tag, TagEnd};

    let parser = Parser::new(body);
    let mut in_paragraph = false;
    let mut text = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Paragraph) => in_paragraph = true,
            Event::End(TagEnd::Paragraph) if in_paragraph => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                text.clear();
                in_paragraph = false;
            }
            Event::Text(t) if in_paragraph => text.push_str(&t),
            Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        "---\n\
skill_id: retry-with-jitter\n\
type: pattern\n\
domain_tags:\n  - networking\n  - reliability\n\
scope: global\n\
stack_context: []\n\
created: 2026-01-10\n\
last_used: 2026-01-10\n\
reuse_count: 0\n\
status: active\n\
verified_by: human\n\
---\n\n\
# Retry with jitter\n\n\
Back off exponentially and add jitter to avoid thundering herds.\n\n\
More detail follows.\n"
            .to_string()
    }

    #[test]
    fn parses_header_and_body() {
        let skill = parse_skill(&sample()).unwrap();
        assert_eq!(skill.frontmatter.skill_id, "retry-with-jitter");
        assert_eq!(skill.frontmatter.domain_tags, vec!["networking", "reliability"]);
        assert_eq!(skill.title(), "Retry with jitter");
        assert!(skill.key_insight().contains("thundering herds"));
    }

    #[test]
    fn rejects_empty_domain_tags() {
        let bad = sample().replace(
            "domain_tags:\n  - networking\n  - reliability\n",
            "domain_tags: []\n",
        );
        assert!(parse_skill(&bad).is_err());
    }

    #[test]
    fn preserves_unknown_header_keys_on_render() {
        let with_extra = sample().replace(
            "verified_by: human\n",
            "verified_by: human\ncustom_field: hello\n",
        );
        let skill = parse_skill(&with_extra).unwrap();
        assert_eq!(
            skill.frontmatter.extra.get("custom_field").and_then(|v| v.as_str()),
            Some("hello")
        );
        let rendered = skill.render().unwrap();
        assert!(rendered.contains("custom_field"));
    }

    #[test]
    fn missing_header_delimiter_is_invalid_input() {
        assert!(parse_skill("# no header here").is_err());
    }
}
