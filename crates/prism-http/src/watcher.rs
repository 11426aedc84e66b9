//! The file watcher: recursively observes a project's specs directory for
//! task-file changes, coalescing rapid bursts per path with a 2-second
//! trailing-edge debounce before enqueueing a [`PrismEvent::TaskFileChanged`].
//!
//! Built on `notify` — the donor has no file-watching concern at all, this
//! is the ecosystem-standard crate for it rather than a hand-rolled poller.
//! `notify`'s own callback runs on a background thread; a bridge task
//! forwards matching events into an async channel where per-path debounce
//! timers live as cancellable tokio tasks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use prism_core::event_queue::{EventQueue, PrismEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Trailing-edge debounce window applied per watched path.
pub const DEBOUNCE: Duration = Duration::from_secs(2);

/// A file counts as a task list if its name ends in `.md` and is not one of
/// PRISM's own generated artifacts (`*.prism.md`) or provenance sidecars
/// (`*.hash`) — without this exclusion, the Task Augmenter writing its
/// sibling output back into the watched directory would re-trigger itself.
fn is_task_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".md") && !name.ends_with(".prism.md") && !name.ends_with(".hash")
}

/// Owns the `notify` watcher and the debounce bridge for one project's
/// specs directory. Dropping or calling [`FileWatcher::shutdown`] stops
/// watching; any debounce timers in flight are aborted, not left to fire.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    bridge: JoinHandle<()>,
    debouncer: JoinHandle<()>,
}

impl FileWatcher {
    /// Start watching `specs_dir` recursively, enqueueing a
    /// [`PrismEvent::TaskFileChanged`] for `project_id` onto `queue` once a
    /// matching path has been quiet for [`DEBOUNCE`].
    pub fn spawn(specs_dir: PathBuf, project_id: String, queue: EventQueue) -> notify::Result<Self> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Event>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!(error = %e, "file watcher error"),
        })?;
        watcher.watch(&specs_dir, RecursiveMode::Recursive)?;

        let (debounced_tx, mut debounced_rx) = mpsc::unbounded_channel::<PathBuf>();
        let bridge = tokio::task::spawn_blocking(move || {
            while let Ok(event) = raw_rx.recv() {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in event.paths {
                    if is_task_file(&path) {
                        let _ = debounced_tx.send(path);
                    }
                }
            }
        });

        let pending: Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>> = Arc::new(Mutex::new(HashMap::new()));
        let debouncer = tokio::spawn(async move {
            while let Some(path) = debounced_rx.recv().await {
                let mut guard = pending.lock().expect("debounce map poisoned");
                if let Some(existing) = guard.remove(&path) {
                    existing.abort();
                }

                let queue = queue.clone();
                let project_id = project_id.clone();
                let debounced_path = path.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(DEBOUNCE).await;
                    let event = PrismEvent::TaskFileChanged { project_id, path: debounced_path };
                    if let Err(e) = queue.try_enqueue(event) {
                        warn!(error = %e, "failed to enqueue debounced file-watch event");
                    }
                });
                guard.insert(path, handle);
            }
        });

        Ok(Self { _watcher: watcher, bridge, debouncer })
    }

    /// Stop watching and abort any in-flight debounce timers.
    pub async fn shutdown(self) {
        self.bridge.abort();
        self.debouncer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_file_recognizes_plain_markdown() {
        assert!(is_task_file(Path::new("/specs/tasks.md")));
    }

    #[test]
    fn task_file_excludes_generated_siblings() {
        assert!(!is_task_file(Path::new("/specs/tasks.prism.md")));
        assert!(!is_task_file(Path::new("/specs/tasks.prism.md.hash")));
    }

    #[test]
    fn task_file_excludes_non_markdown() {
        assert!(!is_task_file(Path::new("/specs/notes.txt")));
    }
}
