//! The Skill Store: durable Skill storage plus the lexical (and optional
//! semantic) index the Ranker searches against.
//!
//! Skills live as individual Markdown files under `<root>/<type-dir>/`
//! (`skills/`, `gotchas/`, `decisions/`, per [`crate::skill::SkillType::dir_name`]).
//! The file is the source of truth; the in-memory cache and the Tantivy
//! index are both caches rebuilt from disk on open or on `rebuild_index`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Local;
use walkdir::WalkDir;

use crate::errors::{PrismError, Result};
use crate::ranker::{RankCandidate, Ranker};
use crate::search::{BM25Config, BM25Index, DomainTagQuery, SkillDocument};
use crate::skill::{self, Skill, SkillStatus, SkillType};
use crate::types::RankedEntry;

/// Filter applied by [`SkillStore::list`].
///
/// `status: None` means "only `active`", matching the common case of
/// listing Skills eligible for ranking; pass `Some(None)` via
/// [`StatusFilter::All`] to see everything, including deprecated and
/// conflicted entries.
#[derive(Debug, Clone, Default)]
pub struct SkillFilter {
    /// Which lifecycle statuses to include.
    pub status: StatusFilter,
    /// Restrict to a single [`SkillType`], or all types.
    pub skill_type: Option<SkillType>,
    /// Restrict to Skills carrying this domain tag.
    pub tag: Option<String>,
}

/// Lifecycle-status half of a [`SkillFilter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// Only `active` Skills (the default).
    #[default]
    Active,
    /// A single specific status.
    Only(SkillStatus),
    /// Every status, regardless of lifecycle state.
    All,
}

impl SkillFilter {
    /// No restriction beyond the default active-only status filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every Skill regardless of status, type, or tag.
    pub fn all() -> Self {
        Self {
            status: StatusFilter::All,
            skill_type: None,
            tag: None,
        }
    }

    fn matches(&self, skill: &Skill) -> bool {
        let status_ok = match self.status {
            StatusFilter::Active => skill.frontmatter.status == SkillStatus::Active,
            StatusFilter::Only(s) => skill.frontmatter.status == s,
            StatusFilter::All => true,
        };
        let type_ok = self
            .skill_type
            .map(|t| t == skill.frontmatter.skill_type)
            .unwrap_or(true);
        let tag_ok = self
            .tag
            .as_ref()
            .map(|tag| skill.frontmatter.domain_tags.iter().any(|t| t == tag))
            .unwrap_or(true);
        status_ok && type_ok && tag_ok
    }
}

/// Summary returned by [`SkillStore::rebuild_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Number of Skill files successfully parsed and indexed.
    pub indexed: usize,
    /// Number of `.md` files skipped because they were unreadable or their
    /// header failed to parse.
    pub skipped: usize,
}

/// Durable storage and search for Skills under a single root directory.
pub struct SkillStore {
    root: PathBuf,
    index: RwLock<BM25Index>,
    cache: RwLock<HashMap<String, Skill>>,
    ranker: Ranker,
}

impl SkillStore {
    /// Open (creating if absent) a Skill Store rooted at `root`, scanning
    /// every `.md` file under it to build the lexical index.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", root.display())))?;

        let index = BM25Index::new(BM25Config::in_memory())
            .map_err(|e| PrismError::InvariantViolation(format!("failed to build lexical index: {e}")))?;

        let store = Self {
            root,
            index: RwLock::new(index),
            cache: RwLock::new(HashMap::new()),
            ranker: Ranker::with_defaults(),
        };
        let report = store.rebuild_index()?;
        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, indexed = report.indexed, "opened store with skipped skill files");
        }
        Ok(store)
    }

    /// Re-scan every Skill file under the root and rebuild both the
    /// in-memory cache and the lexical index from scratch.
    ///
    /// A file with an unreadable or invalid header is skipped, not fatal:
    /// it is counted in the returned [`RebuildReport`] so an operator can
    /// locate and fix it, and the remaining valid corpus is still indexed.
    pub fn rebuild_index(&self) -> Result<RebuildReport> {
        let mut cache = HashMap::new();
        let mut indexed = 0usize;
        let mut skipped = 0usize;
        let mut index = self
            .index
            .write()
            .map_err(|_| PrismError::InvariantViolation("index lock poisoned".into()))?;
        index
            .clear()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to clear index: {e}")))?;

        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable skill file");
                    skipped += 1;
                    continue;
                }
            };
            let parsed = match skill::parse_skill(&content) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unparseable skill file");
                    skipped += 1;
                    continue;
                }
            };
            index
                .add_document(&to_skill_document(&parsed))
                .map_err(|e| PrismError::InvariantViolation(format!("failed to index skill: {e}")))?;
            cache.insert(parsed.frontmatter.skill_id.clone(), parsed);
            indexed += 1;
        }

        index
            .commit()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to commit index: {e}")))?;

        *self
            .cache
            .write()
            .map_err(|_| PrismError::InvariantViolation("cache lock poisoned".into()))? = cache;

        Ok(RebuildReport { indexed, skipped })
    }

    fn path_for(&self, skill: &Skill) -> PathBuf {
        self.root
            .join(skill.frontmatter.skill_type.dir_name())
            .join(skill.file_name())
    }

    /// Write a Skill to disk (write-temp-then-rename) and update the cache
    /// and lexical index.
    ///
    /// Fails with [`PrismError::Conflict`] if `skill_id` is already stored
    /// under a different [`SkillType`] — the type determines the on-disk
    /// directory, so a silent overwrite would orphan the old file.
    pub fn put(&self, skill: Skill) -> Result<()> {
        if let Ok(existing) = self.get(&skill.frontmatter.skill_id) {
            if existing.frontmatter.skill_type != skill.frontmatter.skill_type {
                return Err(PrismError::Conflict(format!(
                    "skill_id {} already stored as {:?}, cannot overwrite as {:?}",
                    skill.frontmatter.skill_id, existing.frontmatter.skill_type, skill.frontmatter.skill_type
                )));
            }
        }

        let path = self.path_for(&skill);
        let dir = path.parent().expect("skill path always has a parent");
        std::fs::create_dir_all(dir)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", dir.display())))?;

        let rendered = skill.render()?;
        let tmp_path = dir.join(format!("{}.tmp", skill.file_name()));
        std::fs::write(&tmp_path, rendered)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to rename {} to {}: {e}", tmp_path.display(), path.display())))?;

        {
            let mut index = self
                .index
                .write()
                .map_err(|_| PrismError::InvariantViolation("index lock poisoned".into()))?;
            index
                .add_document(&to_skill_document(&skill))
                .map_err(|e| PrismError::InvariantViolation(format!("failed to index skill: {e}")))?;
            index
                .commit()
                .map_err(|e| PrismError::InvariantViolation(format!("failed to commit index: {e}")))?;
        }

        self.cache
            .write()
            .map_err(|_| PrismError::InvariantViolation("cache lock poisoned".into()))?
            .insert(skill.frontmatter.skill_id.clone(), skill);

        Ok(())
    }

    /// Fetch a single Skill by id.
    pub fn get(&self, skill_id: &str) -> Result<Skill> {
        self.cache
            .read()
            .map_err(|_| PrismError::InvariantViolation("cache lock poisoned".into()))?
            .get(skill_id)
            .cloned()
            .ok_or_else(|| PrismError::NotFound(format!("no skill with id {skill_id}")))
    }

    /// List Skills matching `filter`, in no particular order.
    pub fn list(&self, filter: &SkillFilter) -> Result<Vec<Skill>> {
        Ok(self
            .cache
            .read()
            .map_err(|_| PrismError::InvariantViolation("cache lock poisoned".into()))?
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    /// Rank every non-deprecated, non-conflicted Skill against `query` text
    /// and `domain_tags`, returning the top `limit` entries.
    pub fn search(&self, query: &str, domain_tags: &[String], limit: usize) -> Result<Vec<RankedEntry>> {
        let index = self
            .index
            .read()
            .map_err(|_| PrismError::InvariantViolation("index lock poisoned".into()))?;
        let cache = self
            .cache
            .read()
            .map_err(|_| PrismError::InvariantViolation("cache lock poisoned".into()))?;

        let lex_hits: HashMap<String, f32> = if query.trim().is_empty() {
            HashMap::new()
        } else {
            index
                .search(query, cache.len().max(1))
                .map_err(|e| PrismError::InvariantViolation(format!("lexical search failed: {e}")))?
                .into_iter()
                .map(|hit| (hit.id, hit.score))
                .collect()
        };

        let candidates: Vec<RankCandidate> = cache
            .values()
            .map(|skill| RankCandidate {
                skill_id: skill.frontmatter.skill_id.clone(),
                lex_raw: lex_hits.get(&skill.frontmatter.skill_id).copied(),
                sem_raw: None,
                domain_tags: skill.frontmatter.domain_tags.clone(),
                reuse_count: skill.frontmatter.reuse_count,
                last_used: skill.frontmatter.last_used,
                status: skill.frontmatter.status,
            })
            .collect();

        let tag_query = DomainTagQuery::new(domain_tags.iter().cloned());
        let today = Local::now().date_naive();
        let mut ranked = self.ranker.rank(candidates, &tag_query, today);
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Increment a Skill's `reuse_count` and bump `last_used` to today,
    /// persisting the change.
    pub fn increment_reuse(&self, skill_id: &str) -> Result<()> {
        let mut skill = self.get(skill_id)?;
        skill.frontmatter.reuse_count += 1;
        skill.frontmatter.last_used = Local::now().date_naive();
        self.put(skill)
    }

    /// The root directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn to_skill_document(skill: &Skill) -> SkillDocument {
    SkillDocument {
        id: skill.frontmatter.skill_id.clone(),
        title: skill.title(),
        key_insight: skill.key_insight(),
        domain_tags: skill.frontmatter.domain_tags.join(" "),
        body: skill.body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::{Scope, SkillFrontmatter, SkillStatus, SkillType, VerifiedBy};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_skill(id: &str, tags: &[&str], body_title: &str) -> Skill {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let frontmatter = SkillFrontmatter {
            skill_id: id.to_string(),
            skill_type: SkillType::Pattern,
            domain_tags: tags.iter().map(|t| t.to_string()).collect(),
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
        let body = format!("# {body_title}\n\nA short key insight about {body_title}.\n");
        Skill::new(frontmatter, body).unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store.put(sample_skill("retry-with-jitter", &["networking"], "Retry with jitter")).unwrap();

        let fetched = store.get("retry-with-jitter").unwrap();
        assert_eq!(fetched.frontmatter.skill_id, "retry-with-jitter");
        assert!(dir.path().join("skills/retry-with-jitter.md").exists());
    }

    #[test]
    fn get_missing_skill_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        assert!(matches!(store.get("nope"), Err(PrismError::NotFound(_))));
    }

    #[test]
    fn search_ranks_tag_matches_first() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store
            .put(sample_skill("net-pattern", &["networking", "reliability"], "Networking pattern"))
            .unwrap();
        store
            .put(sample_skill("ui-pattern", &["frontend"], "Frontend pattern"))
            .unwrap();

        let results = store.search("pattern", &["networking".to_string()], 10).unwrap();
        assert_eq!(results[0].skill_id, "net-pattern");
    }

    #[test]
    fn increment_reuse_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store.put(sample_skill("retry-with-jitter", &["networking"], "Retry with jitter")).unwrap();
        store.increment_reuse("retry-with-jitter").unwrap();

        let reopened = SkillStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("retry-with-jitter").unwrap().frontmatter.reuse_count, 1);
    }

    #[test]
    fn rebuild_index_skips_unparseable_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("skills")).unwrap();
        std::fs::write(dir.path().join("skills/broken.md"), "not a valid skill file").unwrap();

        let store = SkillStore::open(dir.path()).unwrap();
        assert!(store.list(&SkillFilter::all()).unwrap().is_empty());

        let report = store.rebuild_index().unwrap();
        assert_eq!(report.indexed, 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn rebuild_index_reports_mixed_valid_and_invalid_files() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store.put(sample_skill("good-one", &["networking"], "Good")).unwrap();
        std::fs::write(dir.path().join("skills/broken.md"), "not a valid skill file").unwrap();

        let report = store.rebuild_index().unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn put_rejects_type_change_on_existing_id() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store.put(sample_skill("dup-id", &["networking"], "First")).unwrap();

        let mut other_type = sample_skill("dup-id", &["networking"], "Second");
        other_type.frontmatter.skill_type = SkillType::Gotcha;
        assert!(matches!(store.put(other_type), Err(PrismError::Conflict(_))));
    }

    #[test]
    fn list_filters_by_status_and_tag() {
        let dir = tempdir().unwrap();
        let store = SkillStore::open(dir.path()).unwrap();
        store.put(sample_skill("active-one", &["networking"], "Active")).unwrap();
        let mut deprecated = sample_skill("deprecated-one", &["networking"], "Deprecated");
        deprecated.frontmatter.status = SkillStatus::Deprecated;
        store.put(deprecated).unwrap();

        let active_only = store.list(&SkillFilter::new()).unwrap();
        assert_eq!(active_only.len(), 1);
        assert_eq!(active_only[0].frontmatter.skill_id, "active-one");

        let all = store.list(&SkillFilter::all()).unwrap();
        assert_eq!(all.len(), 2);
    }
}
