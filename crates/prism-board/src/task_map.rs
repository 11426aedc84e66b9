//! Advisory cross-process lock guarding mutations to a project's board task
//! map (`prism_core::project::Project::manifest.task_map`).
//!
//! The map itself is persisted by [`prism_core::project::Project::save`]
//! via write-temp-then-rename, which is enough to keep a single process's
//! writes atomic. Across processes (a long-running Event Router and a
//! concurrently invoked CLI command both touching the same project) the
//! spec additionally requires a single owning writer at a time; this lock
//! provides that without pulling in an extra locking crate, matching the
//! donor's own preference for hand-rolled file-based coordination over
//! dependencies like `fs2`/`fs4`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use prism_core::errors::{PrismError, Result};
use tokio::time::Instant;

const LOCK_FILE_NAME: &str = ".task_map.lock";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A held advisory lock; the lock file is removed when this is dropped.
pub struct TaskMapLock {
    path: PathBuf,
}

impl TaskMapLock {
    /// Acquire the lock for `project_root`'s `.prism/` directory, retrying
    /// until `timeout` elapses if another process (or a stale lock from a
    /// crashed one) currently holds it.
    pub async fn acquire(project_root: &Path, timeout: Duration) -> Result<Self> {
        let prism_dir = project_root.join(".prism");
        std::fs::create_dir_all(&prism_dir)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", prism_dir.display())))?;
        let lock_path = prism_dir.join(LOCK_FILE_NAME);

        let start = Instant::now();
        loop {
            match std::fs::OpenOptions::new().create_new(true).write(true).open(&lock_path) {
                Ok(_) => return Ok(Self { path: lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        return Err(PrismError::Conflict(format!(
                            "task map at {} is locked by another process",
                            lock_path.display()
                        )));
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    return Err(PrismError::InvariantViolation(format!(
                        "failed to create lock file {}: {e}",
                        lock_path.display()
                    )))
                }
            }
        }
    }
}

impl Drop for TaskMapLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_then_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let _held = TaskMapLock::acquire(dir.path(), Duration::from_millis(100)).await.unwrap();

        let err = TaskMapLock::acquire(dir.path(), Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, PrismError::Conflict(_)));
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _held = TaskMapLock::acquire(dir.path(), Duration::from_millis(100)).await.unwrap();
        }
        let second = TaskMapLock::acquire(dir.path(), Duration::from_millis(100)).await;
        assert!(second.is_ok());
    }
}
