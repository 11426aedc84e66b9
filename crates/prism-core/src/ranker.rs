//! The Ranker: combines lexical, semantic, tag, reuse, and recency scores
//! into a single ordering over a candidate set of Skills.
//!
//! The Ranker itself does no I/O and knows nothing about Tantivy or
//! embedding providers — callers (chiefly [`crate::store::SkillStore`]) run
//! the lexical search and hand this module raw per-candidate scores to
//! normalize, weight, and combine. No embedding provider is wired in, so
//! the semantic component always scores `0.0`; the weighted sum here is
//! the single source of ranking truth, with no separate fusion step.

use chrono::NaiveDate;

use crate::search::DomainTagQuery;
use crate::skill::SkillStatus;
use crate::types::{ComponentScores, RankedEntry};

/// Weights applied to each of the five [`ComponentScores`] before summing.
///
/// Defaults favor tag affinity and reuse history over raw text match,
/// reflecting that a Skill's value is less "did the words match" and more
/// "has this worked before, for projects like this one."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankerWeights {
    /// Weight for the lexical (BM25) component.
    pub lex: f32,
    /// Weight for the semantic (embedding) component.
    pub sem: f32,
    /// Weight for the domain-tag affinity component.
    pub tag: f32,
    /// Weight for the reuse-count component.
    pub reuse: f32,
    /// Weight for the recency component.
    pub recency: f32,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            lex: 1.0,
            sem: 1.0,
            tag: 3.0,
            reuse: 2.0,
            recency: 1.5,
        }
    }
}

/// A day beyond which a Skill's recency score floors out at `0.0`.
const RECENCY_HORIZON_DAYS: i64 = 180;

/// One candidate's raw inputs to the Ranker, before normalization.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    /// `skill_id`.
    pub skill_id: String,
    /// Raw BM25 score from the lexical index, or `None` if it didn't match.
    pub lex_raw: Option<f32>,
    /// Cosine similarity in `[-1.0, 1.0]` from the semantic index, or `None`
    /// if semantic search is disabled or the skill wasn't a near neighbor.
    pub sem_raw: Option<f32>,
    /// The skill's `domain_tags`, for tag-affinity scoring.
    pub domain_tags: Vec<String>,
    /// The skill's `reuse_count`.
    pub reuse_count: u64,
    /// The skill's `last_used` date.
    pub last_used: NaiveDate,
    /// The skill's lifecycle status; `Deprecated`/`Conflicted` are dropped
    /// before scoring.
    pub status: SkillStatus,
}

/// Combines candidate scores into a final ranking.
#[derive(Debug, Clone)]
pub struct Ranker {
    weights: RankerWeights,
}

impl Ranker {
    /// Build a Ranker with explicit weights.
    pub fn new(weights: RankerWeights) -> Self {
        Self { weights }
    }

    /// Build a Ranker with the default weights.
    pub fn with_defaults() -> Self {
        Self::new(RankerWeights::default())
    }

    /// Rank `candidates` against a query's domain tags, returning entries in
    /// descending `combined_score` order.
    ///
    /// `today` is passed in rather than read from the clock so ranking is
    /// reproducible in tests and deterministic artifact generation.
    pub fn rank(&self, candidates: Vec<RankCandidate>, query_tags: &DomainTagQuery, today: NaiveDate) -> Vec<RankedEntry> {
        let eligible: Vec<RankCandidate> = candidates
            .into_iter()
            .filter(|c| !matches!(c.status, SkillStatus::Deprecated | SkillStatus::Conflicted))
            .collect();

        if eligible.is_empty() {
            return Vec::new();
        }

        let max_lex = eligible
            .iter()
            .filter_map(|c| c.lex_raw)
            .fold(0.0_f32, f32::max);
        let max_reuse = eligible.iter().map(|c| c.reuse_count).max().unwrap_or(0);

        let mut entries: Vec<RankedEntry> = eligible
            .iter()
            .map(|c| {
                let lex = match c.lex_raw {
                    Some(raw) if max_lex > 0.0 => (raw / max_lex).clamp(0.0, 1.0),
                    _ => 0.0,
                };
                let sem = c.sem_raw.map(|raw| raw.clamp(0.0, 1.0)).unwrap_or(0.0);
                let tag = query_tags.score(&c.domain_tags).score;
                let reuse = reuse_score(c.reuse_count, max_reuse);
                let recency = recency_score(c.last_used, today);

                let scores = ComponentScores {
                    lex,
                    sem,
                    tag,
                    reuse,
                    recency,
                };
                let combined_score = self.combine(&scores);

                RankedEntry {
                    skill_id: c.skill_id.clone(),
                    scores,
                    combined_score,
                    reuse_count: c.reuse_count,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.reuse_count.cmp(&a.reuse_count))
                .then_with(|| a.skill_id.cmp(&b.skill_id))
        });

        entries
    }

    fn combine(&self, scores: &ComponentScores) -> f32 {
        self.weights.lex * scores.lex
            + self.weights.sem * scores.sem
            + self.weights.tag * scores.tag
            + self.weights.reuse * scores.reuse
            + self.weights.recency * scores.recency
    }
}

fn reuse_score(reuse_count: u64, max_reuse: u64) -> f32 {
    if max_reuse == 0 {
        return 0.0;
    }
    let numerator = ((reuse_count as f64) + 1.0).ln();
    let denominator = ((max_reuse as f64) + 1.0).ln();
    if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator) as f32
    }
}

fn recency_score(last_used: NaiveDate, today: NaiveDate) -> f32 {
    let days_since = (today - last_used).num_days().max(0) as f32;
    (1.0 - (days_since / RECENCY_HORIZON_DAYS as f32)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, lex: Option<f32>, tags: &[&str], reuse_count: u64, days_ago: i64, today: NaiveDate) -> RankCandidate {
        RankCandidate {
            skill_id: id.to_string(),
            lex_raw: lex,
            sem_raw: None,
            domain_tags: tags.iter().map(|t| t.to_string()).collect(),
            reuse_count,
            last_used: today - chrono::Duration::days(days_ago),
            status: SkillStatus::Active,
        }
    }

    #[test]
    fn deprecated_and_conflicted_are_filtered_out() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let mut dep = candidate("dep", Some(1.0), &["networking"], 0, 0, today);
        dep.status = SkillStatus::Deprecated;
        let mut conf = candidate("conf", Some(1.0), &["networking"], 0, 0, today);
        conf.status = SkillStatus::Conflicted;
        let active = candidate("active", Some(1.0), &["networking"], 0, 0, today);

        let ranker = Ranker::with_defaults();
        let query = DomainTagQuery::new(["networking"]);
        let ranked = ranker.rank(vec![dep, conf, active], &query, today);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].skill_id, "active");
    }

    #[test]
    fn higher_tag_overlap_ranks_first() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let matching = candidate("matching", None, &["networking", "reliability"], 0, 100, today);
        let unrelated = candidate("unrelated", None, &["frontend"], 0, 0, today);

        let ranker = Ranker::with_defaults();
        let query = DomainTagQuery::new(["networking", "reliability"]);
        let ranked = ranker.rank(vec![unrelated, matching], &query, today);

        assert_eq!(ranked[0].skill_id, "matching");
    }

    #[test]
    fn tie_breaks_on_reuse_count_then_skill_id() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let a = candidate("b-skill", None, &[], 5, 0, today);
        let b = candidate("a-skill", None, &[], 5, 0, today);
        let c = candidate("c-skill", None, &[], 1, 0, today);

        let ranker = Ranker::with_defaults();
        let query = DomainTagQuery::empty();
        let ranked = ranker.rank(vec![a, b, c], &query, today);

        assert_eq!(ranked[0].skill_id, "a-skill");
        assert_eq!(ranked[1].skill_id, "b-skill");
        assert_eq!(ranked[2].skill_id, "c-skill");
    }

    #[test]
    fn recency_decays_to_zero_past_horizon() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert_eq!(recency_score(today, today), 1.0);
        assert_eq!(
            recency_score(today - chrono::Duration::days(RECENCY_HORIZON_DAYS + 10), today),
            0.0
        );
    }
}
