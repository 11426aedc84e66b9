//! Project descriptors: `.prism/project.yaml` and the board task map.
//!
//! A Project is a workspace directory: a name, a root, a description, a set
//! of stack tags fed into the Ranker's tag score, and a map from internal
//! task key to external board id. Everything a Project owns lives under
//! `.prism/` inside its root; destroying a Project is removing that directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PrismError, Result};

const PROJECT_MANIFEST_NAME: &str = "project.yaml";

/// A project's `.prism/project.yaml` descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Human-readable project name.
    pub name: String,
    /// Short free-form description.
    #[serde(default)]
    pub description: String,
    /// Technology tags fed into the Ranker's `tag` component.
    #[serde(default)]
    pub stack: Vec<String>,
    /// Internal task key -> external board task id.
    #[serde(default)]
    pub task_map: HashMap<String, String>,
}

impl ProjectManifest {
    /// A bare manifest for a freshly-initialized project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            stack: Vec::new(),
            task_map: HashMap::new(),
        }
    }
}

/// A workspace with a `.prism/` directory holding its manifest, board task
/// map, and generated artifacts.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory the project lives in.
    pub root: PathBuf,
    /// The loaded (or freshly created) manifest.
    pub manifest: ProjectManifest,
}

impl Project {
    fn prism_dir(root: &Path) -> PathBuf {
        root.join(".prism")
    }

    fn manifest_path(root: &Path) -> PathBuf {
        Self::prism_dir(root).join(PROJECT_MANIFEST_NAME)
    }

    /// Load an existing project from its root directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let manifest_path = Self::manifest_path(&root);
        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrismError::NotFound(format!("no project at {}", root.display()))
            } else {
                PrismError::InvariantViolation(format!("failed to read {}: {e}", manifest_path.display()))
            }
        })?;
        let manifest: ProjectManifest = serde_yaml::from_str(&raw)
            .map_err(|e| PrismError::InvalidInput(format!("malformed project.yaml: {e}")))?;
        Ok(Self { root, manifest })
    }

    /// Initialize a new project at `root`, failing if one already exists.
    pub fn init(root: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let manifest_path = Self::manifest_path(&root);
        if manifest_path.exists() {
            return Err(PrismError::Conflict(format!(
                "project already initialized at {}",
                root.display()
            )));
        }
        let project = Self {
            root,
            manifest: ProjectManifest::new(name),
        };
        project.save()?;
        Ok(project)
    }

    /// Persist the manifest via write-temp-then-rename.
    pub fn save(&self) -> Result<()> {
        let dir = Self::prism_dir(&self.root);
        std::fs::create_dir_all(&dir)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to create {}: {e}", dir.display())))?;

        let serialized = serde_yaml::to_string(&self.manifest)
            .map_err(|e| PrismError::InvalidInput(format!("failed to serialize project.yaml: {e}")))?;

        let final_path = Self::manifest_path(&self.root);
        let tmp_path = dir.join(format!("{PROJECT_MANIFEST_NAME}.tmp"));
        std::fs::write(&tmp_path, serialized)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| PrismError::InvariantViolation(format!("failed to rename {} to {}: {e}", tmp_path.display(), final_path.display())))?;
        Ok(())
    }

    /// Path to a generated artifact file under `.prism/`.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        Self::prism_dir(&self.root).join(file_name)
    }

    /// Look up the board id for an internal task key.
    pub fn board_id_for(&self, task_key: &str) -> Option<&str> {
        self.manifest.task_map.get(task_key).map(String::as_str)
    }

    /// Record a new internal-key -> board-id mapping and persist it.
    pub fn record_board_id(&mut self, task_key: impl Into<String>, board_id: impl Into<String>) -> Result<()> {
        self.manifest.task_map.insert(task_key.into(), board_id.into());
        self.save()
    }

    /// Reverse lookup: the internal task key for a board id, if mapped.
    pub fn task_key_for_board_id(&self, board_id: &str) -> Option<&str> {
        self.manifest
            .task_map
            .iter()
            .find(|(_, v)| v.as_str() == board_id)
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_then_open_round_trips() {
        let dir = tempdir().unwrap();
        let project = Project::init(dir.path(), "demo").unwrap();
        assert_eq!(project.manifest.name, "demo");

        let reopened = Project::open(dir.path()).unwrap();
        assert_eq!(reopened.manifest.name, "demo");
    }

    #[test]
    fn init_twice_conflicts() {
        let dir = tempdir().unwrap();
        Project::init(dir.path(), "demo").unwrap();
        assert!(matches!(
            Project::init(dir.path(), "demo-again"),
            Err(PrismError::Conflict(_))
        ));
    }

    #[test]
    fn open_missing_project_is_not_found() {
        let dir = tempdir().unwrap();
        assert!(matches!(Project::open(dir.path()), Err(PrismError::NotFound(_))));
    }

    #[test]
    fn record_board_id_persists_and_reverses() {
        let dir = tempdir().unwrap();
        let mut project = Project::init(dir.path(), "demo").unwrap();
        project.record_board_id("epic-1/task-1", "b-42").unwrap();

        let reopened = Project::open(dir.path()).unwrap();
        assert_eq!(reopened.board_id_for("epic-1/task-1"), Some("b-42"));
        assert_eq!(reopened.task_key_for_board_id("b-42"), Some("epic-1/task-1"));
    }
}
