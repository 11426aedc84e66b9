//! The bounded, per-key serializing queue `prism-http`'s Event Router
//! drives from webhook deliveries, file-watch notifications, and explicit
//! CLI invocations.
//!
//! - [`types`]: [`PrismEvent`], [`EventKey`], [`EventEnvelope`].
//! - [`worker`]: [`EventQueue`] (bounded channel + generation tracking),
//!   [`WorkerPool`] (per-key serialized dispatch, cancellation).
//! - [`storage`]: an optional durable receipt log for restart diagnostics.

pub mod storage;
pub mod types;
pub mod worker;

pub use storage::{EventLog, EventOutcome};
pub use types::{Column, EventEnvelope, EventKey, PrismEvent};
pub use worker::{CancelToken, EnqueueError, EventHandler, EventQueue, GenerationTracker, HandlerContext, WorkerPool};
