use serde::{Deserialize, Serialize};

/// The five weighted components the Ranker combines into a single score.
///
/// Each field is normalized to `[0.0, 1.0]` before weighting; see
/// [`crate::ranker::RankerWeights`] for how they are combined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentScores {
    /// Lexical (BM25) match against the query text.
    pub lex: f32,
    /// Semantic (embedding cosine similarity) match against the query text.
    pub sem: f32,
    /// Overlap between the query's domain tags and the skill's `domain_tags`.
    pub tag: f32,
    /// `log(1 + reuse_count) / log(1 + max_reuse_count)` across the candidate set.
    pub reuse: f32,
    /// `1 - min(1, days_since_last_used / 180)`.
    pub recency: f32,
}

/// A reference to a Skill plus its component scores and combined score.
///
/// `RankedEntry` values are transient: produced by the Ranker for a single
/// query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    /// The ranked skill's identifier.
    pub skill_id: String,
    /// The five component scores that produced `combined_score`.
    pub scores: ComponentScores,
    /// Weighted sum of `scores`, used to order entries and break ties.
    pub combined_score: f32,
    /// `reuse_count` at ranking time, used as the primary tie-break key.
    pub reuse_count: u64,
}

/// The two kinds of derived, regeneratable files the Context Injector writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Project-wide injected context, regenerated on demand or on events.
    InjectedContext,
    /// Per-task briefing derived from a single task's augmented description.
    CurrentTask,
}

/// A derived Markdown file written under a project's `.prism/` directory.
///
/// Artifacts are always fully regenerated and replaced atomically
/// (write-temp-then-rename); nothing ever appends to one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Which kind of artifact this is.
    pub kind: ArtifactKind,
    /// Rendered Markdown content, including the banner, timestamp, and
    /// effective query/budget line.
    pub content: String,
    /// `skill_id`s included in the artifact, in the order they were packed.
    pub included_skill_ids: Vec<String>,
    /// `skill_id`s that ranked but were skipped for exceeding the budget.
    pub skipped_skill_ids: Vec<String>,
    /// Estimated token budget the artifact was packed against.
    pub budget_tokens: usize,
    /// Estimated tokens actually used by `content`.
    pub used_tokens: usize,
}
