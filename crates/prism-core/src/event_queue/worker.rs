//! The Event Router's worker pool: a bounded queue, fan-out across tasks,
//! and per-key serialization with newer-supersedes-older semantics.
//!
//! Concurrency model: events are pulled off one shared, bounded channel by
//! up to `concurrency` workers. Before running a handler, a worker takes an
//! async mutex scoped to the event's [`EventKey`] — two events for the same
//! key never run concurrently, but unrelated keys proceed in parallel. A
//! per-key generation counter lets a handler detect, right before it commits
//! an artifact, whether a newer event for the same key has since been
//! queued; if so it should skip the write rather than race it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use super::types::{EventEnvelope, EventKey, PrismEvent};
use crate::errors::{PrismError, Result};

/// A cooperative cancellation signal handed to every handler invocation.
///
/// Cloning shares the same underlying flag; [`CancelToken::cancel`] wakes
/// every clone's [`CancelToken::cancelled`] waiters.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Request cancellation; idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-key generation tracking, shared between the enqueue side and every
/// handler invocation.
#[derive(Clone, Default)]
pub struct GenerationTracker {
    generations: Arc<StdMutex<HashMap<EventKey, u64>>>,
}

impl GenerationTracker {
    fn bump(&self, key: &EventKey) -> u64 {
        let mut map = self.generations.lock().expect("generation lock poisoned");
        let entry = map.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// `true` if `generation` is still the newest one seen for `key` — i.e.
    /// no event has superseded it since it was enqueued.
    pub fn is_latest(&self, key: &EventKey, generation: u64) -> bool {
        let map = self.generations.lock().expect("generation lock poisoned");
        map.get(key).copied().unwrap_or(0) == generation
    }
}

/// Errors returned when enqueueing fails.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// The bounded channel is at capacity; callers (the webhook handler)
    /// should respond `503` so the sender retries.
    #[error("event queue is at capacity")]
    QueueFull,
    /// The queue has been shut down.
    #[error("event queue is closed")]
    Closed,
}

/// The bounded, multi-producer handle used to enqueue events. Cheap to
/// clone; every clone shares the same channel and generation tracker.
#[derive(Clone)]
pub struct EventQueue {
    sender: mpsc::Sender<EventEnvelope>,
    generations: GenerationTracker,
}

impl EventQueue {
    /// Create a bounded queue with `capacity` slots, returning the queue
    /// handle and the receiver side a [`WorkerPool`] drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                generations: GenerationTracker::default(),
            },
            receiver,
        )
    }

    /// Tag `event` with the next generation for its key and attempt to
    /// enqueue it without blocking. Returns [`EnqueueError::QueueFull`] when
    /// the channel is saturated so the webhook endpoint can apply
    /// backpressure with a `503`.
    pub fn try_enqueue(&self, event: PrismEvent) -> std::result::Result<EventEnvelope, EnqueueError> {
        let key = event.key();
        let generation = self.generations.bump(&key);
        let envelope = EventEnvelope::new(event, generation);

        self.sender
            .try_send(envelope.clone())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            })?;
        Ok(envelope)
    }

    /// The generation tracker backing this queue's supersession checks.
    pub fn generations(&self) -> GenerationTracker {
        self.generations.clone()
    }
}

/// Per-invocation context handed to an [`EventHandler`].
pub struct HandlerContext {
    /// Cooperative cancellation signal for this specific invocation.
    pub cancel: CancelToken,
    generations: GenerationTracker,
}

impl HandlerContext {
    /// `true` once a newer event for the same key has been enqueued — the
    /// handler should abandon any artifact write rather than race it.
    pub fn is_superseded(&self, envelope: &EventEnvelope) -> bool {
        !self.generations.is_latest(&envelope.key(), envelope.generation)
    }
}

/// Implemented once per downstream action the Event Router dispatches to
/// (current-task briefing generation, task-file re-augmentation, ...).
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle a single event. Implementations must check
    /// [`HandlerContext::is_superseded`] immediately before any artifact
    /// write and skip the write if superseded, and must poll
    /// `ctx.cancel.is_cancelled()` at natural suspension points.
    async fn handle(&self, envelope: &EventEnvelope, ctx: &HandlerContext) -> Result<()>;
}

/// Owns the per-key async mutexes that serialize handler invocations, with
/// a janitor that drops locks nobody else references after each use.
#[derive(Clone, Default)]
struct KeyLocks {
    locks: Arc<StdMutex<HashMap<EventKey, Arc<AsyncMutex<()>>>>>,
}

impl KeyLocks {
    fn get(&self, key: &EventKey) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().expect("key lock map poisoned");
        map.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn janitor(&self, key: &EventKey, lock: &Arc<AsyncMutex<()>>) {
        let mut map = self.locks.lock().expect("key lock map poisoned");
        if let Some(entry) = map.get(key) {
            // Two references: the one in the map and `lock` itself. If
            // nothing else is waiting on it, it's safe to drop.
            if Arc::strong_count(entry) <= 2 && Arc::ptr_eq(entry, lock) {
                map.remove(key);
            }
        }
    }
}

/// Drains an [`EventQueue`]'s receiver across a bounded number of concurrent
/// workers, dispatching every envelope to a single shared [`EventHandler`].
pub struct WorkerPool {
    handle: JoinHandle<()>,
    cancel_all: CancelToken,
}

impl WorkerPool {
    /// Spawn `concurrency` workers draining `receiver`, each invoking
    /// `handler` with per-key serialization enforced by a shared lock table.
    pub fn spawn(
        receiver: mpsc::Receiver<EventEnvelope>,
        generations: GenerationTracker,
        handler: Arc<dyn EventHandler>,
        concurrency: usize,
    ) -> Self {
        let cancel_all = CancelToken::new();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let key_locks = KeyLocks::default();

        let mut workers = Vec::with_capacity(concurrency.max(1));
        for worker_id in 0..concurrency.max(1) {
            let receiver = receiver.clone();
            let generations = generations.clone();
            let handler = handler.clone();
            let key_locks = key_locks.clone();
            let cancel_all = cancel_all.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let envelope = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(envelope) = envelope else { break };
                    if cancel_all.is_cancelled() {
                        break;
                    }

                    let key = envelope.key();
                    let lock = key_locks.get(&key);
                    let _permit = lock.lock().await;

                    let ctx = HandlerContext {
                        cancel: cancel_all.clone(),
                        generations: generations.clone(),
                    };

                    if ctx.is_superseded(&envelope) {
                        tracing::debug!(worker_id, event_id = %envelope.id, key = %key, "skipping superseded event before dispatch");
                    } else if let Err(e) = handler.handle(&envelope, &ctx).await {
                        if matches!(e, PrismError::Cancelled(_)) {
                            tracing::debug!(worker_id, event_id = %envelope.id, key = %key, "handler cancelled");
                        } else {
                            tracing::error!(worker_id, event_id = %envelope.id, key = %key, error = %e, "event handler failed");
                        }
                    }

                    drop(_permit);
                    key_locks.janitor(&key, &lock);
                }
            }));
        }

        let joined = futures::future::join_all(workers);
        let handle = tokio::spawn(async move {
            joined.await;
        });

        Self { handle, cancel_all }
    }

    /// Signal every in-flight and future handler invocation to cancel, then
    /// wait for all workers to drain their current event and exit.
    pub async fn shutdown(self) {
        self.cancel_all.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, Duration};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _envelope: &EventEnvelope, _ctx: &HandlerContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_every_enqueued_event() {
        let (queue, receiver) = EventQueue::bounded(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler { calls: calls.clone() });
        let pool = WorkerPool::spawn(receiver, queue.generations(), handler, 2);

        for i in 0..5 {
            queue
                .try_enqueue(PrismEvent::Explicit {
                    project_id: "proj".into(),
                    subject: format!("task-{i}"),
                })
                .unwrap();
        }

        sleep(Duration::from_millis(50)).await;
        pool.shutdown().await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn queue_full_yields_backpressure_error() {
        let (queue, _receiver) = EventQueue::bounded(1);
        queue
            .try_enqueue(PrismEvent::Explicit { project_id: "p".into(), subject: "a".into() })
            .unwrap();
        let second = queue.try_enqueue(PrismEvent::Explicit { project_id: "p".into(), subject: "b".into() });
        assert!(matches!(second, Err(EnqueueError::QueueFull)));
    }

    struct SupersessionHandler {
        superseded_seen: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EventHandler for SupersessionHandler {
        async fn handle(&self, envelope: &EventEnvelope, ctx: &HandlerContext) -> Result<()> {
            sleep(Duration::from_millis(20)).await;
            if ctx.is_superseded(envelope) {
                self.superseded_seen.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn later_generation_marks_earlier_as_superseded() {
        let (queue, receiver) = EventQueue::bounded(16);
        let superseded_seen = Arc::new(AtomicBool::new(false));
        let handler = Arc::new(SupersessionHandler { superseded_seen: superseded_seen.clone() });
        let pool = WorkerPool::spawn(receiver, queue.generations(), handler, 1);

        let event = PrismEvent::Explicit { project_id: "p".into(), subject: "same-key".into() };
        queue.try_enqueue(event.clone()).unwrap();
        queue.try_enqueue(event).unwrap();

        sleep(Duration::from_millis(100)).await;
        pool.shutdown().await;
        assert!(superseded_seen.load(Ordering::SeqCst));
    }
}
