//! PRISM board: the Board Adapter.
//!
//! A thin, retrying HTTP client for an external Kanban-style task board
//! (`client`), plus idempotent task synchronization (`sync`) and the
//! advisory lock (`task_map`) that keeps cross-process mutation of a
//! project's board task map serialized.
//!
//! This crate has no donor analog in `kubiyabot-skill` — the closest thing
//! the donor has is its own retrying network clients (`git_loader.rs`,
//! `embeddings/openai.rs`), whose conventions (typed client wrapping a
//! `reqwest`/provider SDK, explicit timeouts, structured errors over ad hoc
//! panics) this crate follows.

#![warn(missing_docs)]

pub mod client;
pub mod sync;
pub mod task_map;
pub mod types;

pub use client::{BoardClient, HttpBoardClient, RetryConfig};
pub use sync::{sync_tasks, PlannedCreate, SyncReport};
pub use task_map::TaskMapLock;
pub use types::BoardTask;
