//! PRISM core: Skill Store, Ranker, Context Injector, and Task Augmenter.
//!
//! This crate holds the agent-agnostic Memory & Context Pipeline components
//! that the rest of PRISM's crates (`prism-config`, `prism-board`,
//! `prism-http`, `prism-cli`) orchestrate:
//!
//! - **Skill Store** (`store`): durable storage and lexical indexing for
//!   Skills (Markdown documents with a structured frontmatter).
//! - **Ranker** (`ranker`, `search`): combines lexical, semantic, tag,
//!   reuse, and recency scores into a single ranking per query. The
//!   semantic component is always `0.0`; no embedding provider is wired in
//!   (see `DESIGN.md`).
//! - **Context Injector** (`injector`): packs ranked Skills into a
//!   token-budgeted Markdown artifact.
//! - **Task Augmenter** (`task_augmenter`): parses a project's task list and
//!   writes a per-task briefing sibling file.
//! - **Event Router support** (`event_queue`): the bounded, per-key
//!   serializing queue that `prism-http` drives from webhooks, file-watch
//!   events, and explicit CLI invocations.
//! - **Memory Sync** (`memory_sync`): stage/commit/push/pull of a project's
//!   memory directory against its configured git remote.
//! - **Evaluator** (`evaluator`, optional): asks an external LLM for an
//!   ADD/UPDATE/NOOP/DELETE verdict on a candidate Skill.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use prism_core::store::SkillStore;
//!
//! # fn run() -> prism_core::errors::Result<()> {
//! let store = SkillStore::open("~/.prism/skills")?;
//! let entries = store.search("kubernetes rollout", &["kubernetes".to_string()], 10)?;
//! # let _ = entries;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `evaluator-ollama` / `evaluator-openai`: enable the optional Evaluator
//!   against a local Ollama model or the OpenAI API, respectively. With
//!   neither enabled, `evaluator::Evaluator::from_env` returns
//!   `PrismError::ConfigurationMissing`.

#![warn(missing_docs)]

pub mod credentials;
pub mod errors;
pub mod event_queue;
pub mod evaluator;
pub mod injector;
pub mod memory_sync;
pub mod project;
pub mod ranker;
pub mod search;
pub mod skill;
pub mod store;
pub mod task_augmenter;
pub mod types;

pub use credentials::{parse_keyring_reference, CredentialStore, SecureString};
pub use errors::{PrismError, Result};
pub use evaluator::{Evaluator, Verdict};
pub use event_queue::{
    CancelToken, EnqueueError, EventEnvelope, EventHandler, EventKey, EventLog, EventOutcome,
    EventQueue, GenerationTracker, HandlerContext, PrismEvent, WorkerPool,
};
pub use injector::{ContextInjector, InjectorConfig};
pub use memory_sync::{GitCredentials, MemorySync, SyncStatus};
pub use project::{Project, ProjectManifest};
pub use ranker::{Ranker, RankerWeights};
pub use skill::{Scope, Skill, SkillFrontmatter, SkillStatus, SkillType, VerifiedBy};
pub use store::{RebuildReport, SkillFilter, SkillStore, StatusFilter};
pub use task_augmenter::TaskAugmenter;
pub use types::{Artifact, ArtifactKind, ComponentScores, RankedEntry};
pub use search::{
    reciprocal_rank_fusion, weighted_sum_fusion, BM25Config, BM25Index, BM25SearchResult,
    DomainTagQuery, FusionMethod, TagMatch,
};
