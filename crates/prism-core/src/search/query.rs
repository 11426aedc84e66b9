//! Domain-tag matching for the Ranker's `tag` component.
//!
//! A query carries its own set of domain tags (supplied by the caller, e.g.
//! a Task Augmenter query built from a task's epic name and stack context).
//! The `tag` score is the Jaccard overlap between that set and a Skill's
//! `domain_tags` — no synonym expansion, no intent classification, just
//! exact (case-insensitive) tag matching.

use std::collections::HashSet;

/// A query's domain tags, normalized once and matched against many Skills.
#[derive(Debug, Clone)]
pub struct DomainTagQuery {
    tags: HashSet<String>,
}

impl DomainTagQuery {
    /// Build a query from raw tags, lowercasing and deduplicating them.
    pub fn new(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let tags = tags.into_iter().map(|t| t.into().to_lowercase()).collect();
        Self { tags }
    }

    /// An empty query: every Skill scores `0.0` tag affinity against it.
    pub fn empty() -> Self {
        Self { tags: HashSet::new() }
    }

    /// Whether this query carries no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Score a Skill's `domain_tags` against this query.
    ///
    /// Jaccard similarity: `|intersection| / |union|`. Returns `0.0` if
    /// either set is empty.
    pub fn score(&self, skill_domain_tags: &[String]) -> TagMatch {
        let skill_tags: HashSet<String> = skill_domain_tags.iter().map(|t| t.to_lowercase()).collect();

        if self.tags.is_empty() || skill_tags.is_empty() {
            return TagMatch {
                score: 0.0,
                matched_tags: Vec::new(),
            };
        }

        let intersection: Vec<String> = self.tags.intersection(&skill_tags).cloned().collect();
        let union_size = self.tags.union(&skill_tags).count();

        let score = if union_size == 0 {
            0.0
        } else {
            intersection.len() as f32 / union_size as f32
        };

        TagMatch {
            score,
            matched_tags: intersection,
        }
    }
}

/// The result of matching a query's domain tags against a Skill's.
#[derive(Debug, Clone, PartialEq)]
pub struct TagMatch {
    /// Jaccard similarity in `[0.0, 1.0]`.
    pub score: f32,
    /// Tags present in both the query and the skill, for explainability.
    pub matched_tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_tags_score_zero() {
        let query = DomainTagQuery::new(["networking"]);
        let result = query.score(&["database".to_string()]);
        assert_eq!(result.score, 0.0);
        assert!(result.matched_tags.is_empty());
    }

    #[test]
    fn full_overlap_scores_one() {
        let query = DomainTagQuery::new(["networking", "reliability"]);
        let result = query.score(&["reliability".to_string(), "networking".to_string()]);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn partial_overlap_is_jaccard() {
        let query = DomainTagQuery::new(["networking", "reliability"]);
        let result = query.score(&["networking".to_string(), "database".to_string()]);
        // intersection = {networking} = 1, union = {networking, reliability, database} = 3
        assert!((result.score - (1.0 / 3.0)).abs() < 1e-6);
        assert_eq!(result.matched_tags, vec!["networking".to_string()]);
    }

    #[test]
    fn empty_query_scores_zero() {
        let query = DomainTagQuery::empty();
        assert!(query.is_empty());
        let result = query.score(&["networking".to_string()]);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let query = DomainTagQuery::new(["Networking"]);
        let result = query.score(&["networking".to_string()]);
        assert_eq!(result.score, 1.0);
    }
}
