//! Memory Sync: stage, commit, push, and pull the memory directory against
//! its configured git remote.
//!
//! Implemented directly against `git2` (vendored libgit2) rather than
//! shelling out to the `git` binary, so staging/committing/status runs
//! through a typed API with structured errors instead of parsed CLI output.
//! Push and pull still ultimately hit the network; credential resolution is
//! left to the caller via [`MemorySync::with_credentials`] so it can be
//! wired to the same provider chain used for LLM credentials.

use std::path::{Path, PathBuf};

use git2::{
    Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature, StatusOptions,
};
use tracing::{debug, info};

use crate::errors::{PrismError, Result};

/// A username/password (or token-as-password) pair used to authenticate
/// push/pull against a remote. PRISM never stores these itself; the caller
/// resolves them (typically via [`crate::credentials::CredentialStore`])
/// and hands them to [`MemorySync::with_credentials`] per call.
#[derive(Debug, Clone)]
pub struct GitCredentials {
    /// Remote username (for tokens, often a fixed placeholder like `"x-access-token"`).
    pub username: String,
    /// Password or personal access token.
    pub password: String,
}

/// The working-tree status of the memory directory, ahead of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Paths with staged or unstaged modifications relative to HEAD.
    pub modified: Vec<String>,
    /// Paths present on disk but not yet tracked.
    pub untracked: Vec<String>,
    /// True if there is nothing to commit.
    pub is_clean: bool,
}

/// Drives git operations against a memory directory's repository.
pub struct MemorySync {
    repo_path: PathBuf,
    credentials: Option<GitCredentials>,
}

impl MemorySync {
    /// Open the repository rooted at `repo_path`. The directory must already
    /// be a git working tree (initialized by `prism init` or pre-existing);
    /// this does not run `git init`.
    pub fn open(repo_path: impl Into<PathBuf>) -> Result<Self> {
        let repo_path = repo_path.into();
        Repository::open(&repo_path).map_err(|e| {
            PrismError::ConfigurationMissing(format!(
                "{} is not a git repository: {e}",
                repo_path.display()
            ))
        })?;
        Ok(Self { repo_path, credentials: None })
    }

    /// Attach remote credentials for subsequent push/pull calls on this
    /// instance.
    pub fn with_credentials(mut self, credentials: GitCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn repo(&self) -> Result<Repository> {
        Repository::open(&self.repo_path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to reopen repository: {e}")))
    }

    /// Report unstaged/untracked paths under the memory directory without
    /// mutating anything.
    pub fn status(&self) -> Result<SyncStatus> {
        let repo = self.repo()?;
        let mut options = StatusOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);

        let statuses = repo
            .statuses(Some(&mut options))
            .map_err(|e| PrismError::InvariantViolation(format!("failed to read git status: {e}")))?;

        let mut modified = Vec::new();
        let mut untracked = Vec::new();

        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            let status = entry.status();
            if status.is_wt_new() || status.is_index_new() {
                untracked.push(path.to_string());
            } else if !status.is_ignored() {
                modified.push(path.to_string());
            }
        }

        let is_clean = modified.is_empty() && untracked.is_empty();
        Ok(SyncStatus { modified, untracked, is_clean })
    }

    /// Stage every pending change under the memory directory (`git add -A`
    /// equivalent) and commit it with a templated message. Returns `Ok(None)`
    /// with nothing committed if there is nothing staged.
    pub fn commit_all(&self, author_name: &str, author_email: &str, summary: &str) -> Result<Option<git2::Oid>> {
        let repo = self.repo()?;
        let status = self.status()?;
        if status.is_clean {
            debug!("memory directory clean, nothing to commit");
            return Ok(None);
        }

        let mut index = repo
            .index()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to open git index: {e}")))?;
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to stage changes: {e}")))?;
        index
            .write()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write git index: {e}")))?;

        let tree_id = index
            .write_tree()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write tree: {e}")))?;
        let tree = repo
            .find_tree(tree_id)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to load tree: {e}")))?;

        let signature = Signature::now(author_name, author_email)
            .map_err(|e| PrismError::InvalidInput(format!("invalid commit author: {e}")))?;

        let message = format!("prism memory: {summary}");

        let parents: Vec<git2::Commit> = match repo.head() {
            Ok(head) => vec![head
                .peel_to_commit()
                .map_err(|e| PrismError::InvariantViolation(format!("failed to resolve HEAD: {e}")))?],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, &message, &tree, &parent_refs)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to commit: {e}")))?;

        info!(oid = %oid, "committed memory changes");
        Ok(Some(oid))
    }

    /// Push the current branch to `remote_name` (typically `"origin"`).
    pub async fn push(&self, remote_name: &str) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|e| PrismError::ConfigurationMissing(format!("no remote named {remote_name:?}: {e}")))?;

        let head = repo
            .head()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to resolve HEAD: {e}")))?;
        let branch = head
            .shorthand()
            .ok_or_else(|| PrismError::InvariantViolation("HEAD is detached, nothing to push".into()))?
            .to_string();
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

        let mut callbacks = RemoteCallbacks::new();
        self.wire_credentials(&mut callbacks);

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        remote
            .push(&[&refspec], Some(&mut options))
            .map_err(|e| PrismError::ExternalUnavailable(format!("push to {remote_name} failed: {e}")))?;

        info!(remote = remote_name, branch = %branch, "pushed memory changes");
        Ok(())
    }

    /// Fetch and fast-forward the current branch from `remote_name`. Fails
    /// with [`PrismError::Conflict`] rather than attempting a merge if the
    /// local branch has diverged; memory sync never auto-merges.
    pub async fn pull(&self, remote_name: &str) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|e| PrismError::ConfigurationMissing(format!("no remote named {remote_name:?}: {e}")))?;

        let mut callbacks = RemoteCallbacks::new();
        self.wire_credentials(&mut callbacks);

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        remote
            .fetch::<&str>(&[], Some(&mut fetch_options), None)
            .map_err(|e| PrismError::ExternalUnavailable(format!("fetch from {remote_name} failed: {e}")))?;

        let head = repo
            .head()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to resolve HEAD: {e}")))?;
        let branch = head
            .shorthand()
            .ok_or_else(|| PrismError::InvariantViolation("HEAD is detached, cannot pull".into()))?
            .to_string();

        let remote_ref = repo
            .find_reference(&format!("refs/remotes/{remote_name}/{branch}"))
            .map_err(|e| PrismError::NotFound(format!("no remote branch {remote_name}/{branch}: {e}")))?;
        let remote_commit = remote_ref
            .peel_to_annotated_commit()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to read remote commit: {e}")))?;

        let (merge_analysis, _) = repo
            .merge_analysis(&[&remote_commit])
            .map_err(|e| PrismError::InvariantViolation(format!("merge analysis failed: {e}")))?;

        if merge_analysis.is_up_to_date() {
            debug!("memory directory already up to date");
            return Ok(());
        }
        if !merge_analysis.is_fast_forward() {
            return Err(PrismError::Conflict(format!(
                "local branch {branch} has diverged from {remote_name}/{branch}; pull requires manual resolution"
            )));
        }

        let mut reference = repo
            .find_reference(&format!("refs/heads/{branch}"))
            .map_err(|e| PrismError::InvariantViolation(format!("failed to resolve local branch: {e}")))?;
        reference
            .set_target(remote_commit.id(), "prism memory: fast-forward pull")
            .map_err(|e| PrismError::InvariantViolation(format!("failed to fast-forward: {e}")))?;
        repo.set_head(&format!("refs/heads/{branch}"))
            .map_err(|e| PrismError::InvariantViolation(format!("failed to move HEAD: {e}")))?;
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
            .map_err(|e| PrismError::InvariantViolation(format!("failed to checkout fast-forwarded HEAD: {e}")))?;

        info!(remote = remote_name, branch = %branch, "fast-forwarded memory directory");
        Ok(())
    }

    fn wire_credentials(&self, callbacks: &mut RemoteCallbacks<'_>) {
        if let Some(creds) = self.credentials.clone() {
            callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
                Cred::userpass_plaintext(&creds.username, &creds.password)
            });
        }
    }

    /// The memory directory's filesystem root.
    pub fn root(&self) -> &Path {
        &self.repo_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let signature = Signature::now("Test", "test@example.com").unwrap();
            let tree_id = {
                let mut index = repo.index().unwrap();
                index.write_tree().unwrap()
            };
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn status_reports_untracked_file() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("new.md"), "hello").unwrap();

        let sync = MemorySync::open(dir.path()).unwrap();
        let status = sync.status().unwrap();
        assert!(!status.is_clean);
        assert!(status.untracked.contains(&"new.md".to_string()));
    }

    #[test]
    fn commit_all_stages_and_commits_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("new.md"), "hello").unwrap();

        let sync = MemorySync::open(dir.path()).unwrap();
        let oid = sync.commit_all("Test", "test@example.com", "add new.md").unwrap();
        assert!(oid.is_some());

        let status = sync.status().unwrap();
        assert!(status.is_clean);
    }

    #[test]
    fn commit_all_is_noop_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let sync = MemorySync::open(dir.path()).unwrap();
        let oid = sync.commit_all("Test", "test@example.com", "nothing to do").unwrap();
        assert!(oid.is_none());
    }

    #[test]
    fn open_rejects_non_repository_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MemorySync::open(dir.path()).is_err());
    }
}
