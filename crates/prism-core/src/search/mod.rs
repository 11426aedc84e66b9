//! Search module backing the Ranker's lexical and tag components.
//!
//! Provides BM25 lexical search (`bm25`), generic fusion math shared across
//! callers (`fusion`), and domain-tag query matching (`query`). The
//! five-component weighted Ranker itself lives at the crate root
//! (`crate::ranker`); its semantic component always scores `0.0` since no
//! embedding provider is wired in (see `DESIGN.md`).

mod bm25;
mod fusion;
mod query;

pub use bm25::{BM25Config, BM25Index, BM25SearchResult, SkillDocument};
pub use fusion::{reciprocal_rank_fusion, weighted_sum_fusion, FusionMethod};
pub use query::{DomainTagQuery, TagMatch};
