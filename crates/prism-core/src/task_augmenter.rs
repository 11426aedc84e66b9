//! The Task Augmenter: parses a project's task list and writes a sibling
//! briefing file, without ever mutating the input.
//!
//! Grammar recognized in the source Markdown:
//!
//! ```text
//! ## Epic: <name>
//! ### Task <n>: <title>
//! <body, verbatim, until the next ### or ## heading>
//! ```
//!
//! Tasks appearing before any `## Epic:` heading are filed under an
//! implicit `Uncategorized` epic. The augmented output is always the full
//! input, byte-for-byte, with a `### PRISM Context` block appended under
//! every task's body.

use std::path::{Path, PathBuf};

use crate::errors::{PrismError, Result};
use crate::store::SkillStore;
use crate::types::RankedEntry;

const UNCATEGORIZED_EPIC: &str = "Uncategorized";

/// A single `### Task N: <title>` entry and its verbatim body.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// The `N` in `### Task N:`.
    pub number: u32,
    /// The title following the colon.
    pub title: String,
    /// Everything between this task's heading and the next heading,
    /// trimmed of a single leading/trailing blank line.
    pub body: String,
}

/// A `## Epic: <name>` section and the tasks filed under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Epic {
    /// The epic's name, or [`UNCATEGORIZED_EPIC`] for tasks with no epic heading.
    pub name: String,
    /// Tasks in source order.
    pub tasks: Vec<Task>,
}

/// A parsed task list document.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDocument {
    /// Epics in source order.
    pub epics: Vec<Epic>,
}

impl TaskDocument {
    /// An iterator over every `(epic_name, task)` pair, in source order.
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Task)> {
        self.epics
            .iter()
            .flat_map(|epic| epic.tasks.iter().map(move |t| (epic.name.as_str(), t)))
    }

    /// `"<epic>/task-<n>"`, the key used to address a task for Board Adapter
    /// sync and Ranker queries.
    pub fn task_key(epic_name: &str, task: &Task) -> String {
        format!("{epic_name}/task-{}", task.number)
    }
}

/// Parse a task list document from its raw Markdown text.
pub fn parse_task_document(content: &str) -> Result<TaskDocument> {
    let mut epics: Vec<Epic> = Vec::new();
    let mut current_epic = UNCATEGORIZED_EPIC.to_string();
    let mut current_task: Option<(u32, String)> = None;
    let mut current_body = String::new();

    fn flush_task(epics: &mut Vec<Epic>, epic_name: &str, task: Option<(u32, String)>, body: String) {
        let Some((number, title)) = task else { return };
        let epic = match epics.iter_mut().find(|e| e.name == epic_name) {
            Some(e) => e,
            None => {
                epics.push(Epic {
                    name: epic_name.to_string(),
                    tasks: Vec::new(),
                });
                epics.last_mut().unwrap()
            }
        };
        epic.tasks.push(Task {
            number,
            title,
            body: body.trim_matches('\n').to_string(),
        });
    }

    for line in content.lines() {
        if let Some(name) = line.strip_prefix("## Epic:") {
            flush_task(&mut epics, &current_epic, current_task.take(), std::mem::take(&mut current_body));
            current_epic = name.trim().to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("### Task ") {
            flush_task(&mut epics, &current_epic, current_task.take(), std::mem::take(&mut current_body));
            let (number_str, title) = rest
                .split_once(':')
                .ok_or_else(|| PrismError::InvalidInput(format!("malformed task heading: {line}")))?;
            let number: u32 = number_str
                .trim()
                .parse()
                .map_err(|_| PrismError::InvalidInput(format!("malformed task number: {line}")))?;
            current_task = Some((number, title.trim().to_string()));
            continue;
        }
        current_body.push_str(line);
        current_body.push('\n');
    }
    flush_task(&mut epics, &current_epic, current_task.take(), current_body);

    Ok(TaskDocument { epics })
}

/// The sibling path an augmented file is written to: `tasks.md` becomes
/// `tasks.prism.md`, alongside the original.
pub fn augmented_path(source: &Path) -> PathBuf {
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("tasks");
    source.with_file_name(format!("{stem}.prism.md"))
}

fn hash_sidecar_path(augmented: &Path) -> PathBuf {
    let mut name = augmented.as_os_str().to_owned();
    name.push(".hash");
    PathBuf::from(name)
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Number of Skills ranked as candidates per task's `### PRISM Context`
/// block, before `per_task_budget_tokens` trims how many are actually
/// rendered.
const CONTEXT_SKILLS_PER_TASK: usize = 5;

/// Characters of rendered Markdown assumed to cost one token, matching
/// `ContextInjector`'s estimator.
const CHARS_PER_TOKEN: usize = 4;

/// Default per-task token budget, used when a caller has no
/// `prism.toml`-sourced override.
pub const DEFAULT_TASK_BUDGET_TOKENS: usize = 500;

/// Parses task lists and writes `### PRISM Context`-augmented siblings.
pub struct TaskAugmenter<'a> {
    store: &'a SkillStore,
    per_task_budget_tokens: usize,
}

impl<'a> TaskAugmenter<'a> {
    /// Build an Augmenter backed by `store` for its Ranker queries,
    /// rendering at most `per_task_budget_tokens` (est.) of Skill context
    /// per task.
    pub fn new(store: &'a SkillStore, per_task_budget_tokens: usize) -> Self {
        Self { store, per_task_budget_tokens }
    }

    /// Build an Augmenter using [`DEFAULT_TASK_BUDGET_TOKENS`].
    pub fn with_default_budget(store: &'a SkillStore) -> Self {
        Self::new(store, DEFAULT_TASK_BUDGET_TOKENS)
    }

    /// Read `source_path`, augment every task with ranked Skill context, and
    /// write the sibling `.prism.md` file.
    ///
    /// If the sibling already exists and its content hash no longer matches
    /// the hash recorded when PRISM last wrote it, a manual edit is assumed
    /// and this returns [`PrismError::Conflict`] unless `force` is set.
    pub fn augment(&self, source_path: &Path, stack_context: &[String], force: bool) -> Result<PathBuf> {
        let content = std::fs::read_to_string(source_path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to read {}: {e}", source_path.display())))?;
        let doc = parse_task_document(&content)?;
        let output_path = augmented_path(source_path);

        self.check_for_conflict(&output_path, force)?;

        let rendered = self.render(&doc, stack_context)?;

        if let Some(dir) = output_path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", dir.display())))?;
        }
        let mut tmp_name = output_path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, &rendered)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &output_path).map_err(|e| {
            PrismError::InvariantViolation(format!("failed to rename {} to {}: {e}", tmp_path.display(), output_path.display()))
        })?;

        let hash = blake3::hash(rendered.as_bytes());
        let sidecar = hash_sidecar_path(&output_path);
        std::fs::write(&sidecar, hash.to_hex().as_bytes())
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", sidecar.display())))?;

        Ok(output_path)
    }

    fn check_for_conflict(&self, output_path: &Path, force: bool) -> Result<()> {
        if force || !output_path.exists() {
            return Ok(());
        }
        let sidecar = hash_sidecar_path(output_path);
        let Ok(recorded_hex) = std::fs::read_to_string(&sidecar) else {
            // No sidecar: we've never tracked this file's provenance, so we
            // can't tell whether it was hand-edited. Treat as a conflict.
            return Err(PrismError::Conflict(format!(
                "{} exists with no PRISM provenance record; pass force to overwrite",
                output_path.display()
            )));
        };
        let on_disk = std::fs::read(output_path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to read {}: {e}", output_path.display())))?;
        let on_disk_hex = blake3::hash(&on_disk).to_hex().to_string();
        if on_disk_hex != recorded_hex.trim() {
            return Err(PrismError::Conflict(format!(
                "{} was modified since PRISM last wrote it; pass force to overwrite",
                output_path.display()
            )));
        }
        Ok(())
    }

    fn render(&self, doc: &TaskDocument, stack_context: &[String]) -> Result<String> {
        let mut out = String::new();
        out.push_str("<!-- Generated by PRISM. Do not edit by hand. -->\n\n");

        for epic in &doc.epics {
            out.push_str(&format!("## Epic: {}\n\n", epic.name));
            for task in &epic.tasks {
                out.push_str(&format!("### Task {}: {}\n", task.number, task.title));
                if !task.body.is_empty() {
                    out.push_str(&task.body);
                    out.push('\n');
                }
                out.push_str(&self.render_context_block(&epic.name, task, stack_context)?);
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn render_context_block(&self, epic_name: &str, task: &Task, stack_context: &[String]) -> Result<String> {
        let query = format!("{epic_name} {}", task.title);
        let ranked: Vec<RankedEntry> = self.store.search(&query, stack_context, CONTEXT_SKILLS_PER_TASK)?;

        if ranked.is_empty() {
            return Ok("\n### PRISM Context\n\nNo relevant skills found.\n".to_string());
        }

        let header = "\n### PRISM Context\n\n";
        let mut block = String::from(header);
        let mut used_tokens = estimate_tokens(header);
        let mut included = 0usize;

        for entry in ranked {
            let skill = self.store.get(&entry.skill_id)?;
            let bullet = format!(
                "- `{}` ({:?}): {}\n",
                skill.frontmatter.skill_id,
                skill.frontmatter.skill_type,
                skill.title(),
            );
            let bullet_tokens = estimate_tokens(&bullet);
            if included > 0 && used_tokens + bullet_tokens > self.per_task_budget_tokens {
                break;
            }
            block.push_str(&bullet);
            used_tokens += bullet_tokens;
            included += 1;
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "## Epic: Billing\n\
### Task 1: Add invoice export\n\
Export invoices as CSV.\n\n\
### Task 2: Fix rounding bug\n\
Round to two decimal places.\n\n\
## Epic: Auth\n\
### Task 1: Add SSO\n\
Support SAML login.\n";

    #[test]
    fn parses_epics_and_tasks_in_order() {
        let doc = parse_task_document(SAMPLE).unwrap();
        assert_eq!(doc.epics.len(), 2);
        assert_eq!(doc.epics[0].name, "Billing");
        assert_eq!(doc.epics[0].tasks.len(), 2);
        assert_eq!(doc.epics[0].tasks[0].title, "Add invoice export");
        assert!(doc.epics[0].tasks[0].body.contains("CSV"));
        assert_eq!(doc.epics[1].name, "Auth");
    }

    #[test]
    fn tasks_before_any_epic_are_uncategorized() {
        let content = "### Task 1: Orphan task\nNo epic yet.\n";
        let doc = parse_task_document(content).unwrap();
        assert_eq!(doc.epics.len(), 1);
        assert_eq!(doc.epics[0].name, UNCATEGORIZED_EPIC);
    }

    #[test]
    fn task_key_combines_epic_and_number() {
        let doc = parse_task_document(SAMPLE).unwrap();
        let (epic, task) = doc.tasks().next().unwrap();
        assert_eq!(TaskDocument::task_key(epic, task), "Billing/task-1");
    }

    #[test]
    fn augmented_path_replaces_extension() {
        let path = augmented_path(Path::new("/proj/tasks.md"));
        assert_eq!(path, PathBuf::from("/proj/tasks.prism.md"));
    }

    #[test]
    fn augment_writes_sibling_and_leaves_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tasks.md");
        std::fs::write(&source, SAMPLE).unwrap();

        let store = SkillStore::open(dir.path().join(".prism-store")).unwrap();
        let augmenter = TaskAugmenter::with_default_budget(&store);
        let output = augmenter.augment(&source, &[], false).unwrap();

        assert_eq!(std::fs::read_to_string(&source).unwrap(), SAMPLE);
        let augmented = std::fs::read_to_string(&output).unwrap();
        assert!(augmented.contains("PRISM Context"));
        assert!(augmented.contains("Add invoice export"));
    }

    #[test]
    fn augment_twice_without_force_does_not_conflict_on_unmodified_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tasks.md");
        std::fs::write(&source, SAMPLE).unwrap();

        let store = SkillStore::open(dir.path().join(".prism-store")).unwrap();
        let augmenter = TaskAugmenter::with_default_budget(&store);
        augmenter.augment(&source, &[], false).unwrap();
        assert!(augmenter.augment(&source, &[], false).is_ok());
    }

    #[test]
    fn render_context_block_respects_per_task_budget() {
        use crate::skill::{Scope, SkillFrontmatter, SkillStatus, SkillType, VerifiedBy};
        use chrono::NaiveDate;

        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::open(dir.path().join(".prism-store")).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        for i in 0..5 {
            let frontmatter = SkillFrontmatter {
                skill_id: format!("invoice-export-{i}"),
                skill_type: SkillType::Skill,
                domain_tags: vec!["billing".to_string()],
                scope: Scope::Global,
                stack_context: vec![],
                created: today,
                last_used: today,
                reuse_count: 0,
                project_origin: None,
                status: SkillStatus::Active,
                verified_by: VerifiedBy::Human,
                extra: Default::default(),
            };
            store
                .put(crate::skill::Skill::new(frontmatter, "# Invoice export\n\nExport invoices as CSV.".to_string()).unwrap())
                .unwrap();
        }

        let generous = TaskAugmenter::new(&store, 10_000);
        let task = Task { number: 1, title: "Add invoice export".to_string(), body: String::new() };
        let full_block = generous.render_context_block("Billing", &task, &[]).unwrap();
        let full_bullets = full_block.lines().filter(|l| l.starts_with("- `")).count();
        assert!(full_bullets >= 2);

        let tight = TaskAugmenter::new(&store, 1);
        let tight_block = tight.render_context_block("Billing", &task, &[]).unwrap();
        let tight_bullets = tight_block.lines().filter(|l| l.starts_with("- `")).count();
        assert_eq!(tight_bullets, 1, "a budget below one bullet's cost still renders exactly one, never zero");
        assert!(tight_bullets < full_bullets);
    }

    #[test]
    fn augment_conflicts_on_hand_edited_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tasks.md");
        std::fs::write(&source, SAMPLE).unwrap();

        let store = SkillStore::open(dir.path().join(".prism-store")).unwrap();
        let augmenter = TaskAugmenter::with_default_budget(&store);
        let output = augmenter.augment(&source, &[], false).unwrap();

        let mut edited = std::fs::read_to_string(&output).unwrap();
        edited.push_str("\nhand-added note\n");
        std::fs::write(&output, edited).unwrap();

        assert!(matches!(augmenter.augment(&source, &[], false), Err(PrismError::Conflict(_))));
        assert!(augmenter.augment(&source, &[], true).is_ok());
    }
}
