//! `~/.prism/prism.config.yaml`: the user's machine-wide configuration,
//! shared across every project it touches.
//!
//! This is distinct from a project's own `prism.toml`
//! ([`crate::global_config::PrismConfig`]), which only ever tunes Ranker,
//! Context Injector, Evaluator, and Board Adapter settings for that one
//! project. The global file instead holds things that don't belong to any
//! single project: the tool registry agents are allowed to call, short
//! aliases for LLM model strings, default agent-role assignments, and
//! memory-wide options. A project's `.prism/AGENTS.md` can override
//! `agent_roles` per-project, in the same `role -> assignment` schema used
//! here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Result;

/// Root of `~/.prism/prism.config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// External tools agents may invoke, keyed by tool name.
    #[serde(default)]
    pub tool_registry: HashMap<String, ToolDescriptor>,
    /// Short names for `provider:model` strings, e.g.
    /// `"fast" -> "openai:gpt-4o-mini"`.
    #[serde(default)]
    pub llm_model_aliases: HashMap<String, String>,
    /// Default `role -> agent identifier` assignment, overridable per
    /// project by `.prism/AGENTS.md`.
    #[serde(default)]
    pub agent_roles: HashMap<String, String>,
    /// Memory-wide options shared by every project's memory directory.
    #[serde(default)]
    pub memory: GlobalMemorySettings,
}

/// A single entry in the tool registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Command an agent runs to invoke this tool.
    pub command: String,
    /// Short human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Memory-wide options: whether to compute embeddings, the default git
/// remote new memory repositories are configured with, and whether writes
/// auto-commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalMemorySettings {
    /// Whether Skill writes should also compute embeddings. Currently
    /// advisory only: this build's Ranker has no semantic component to feed
    /// (see `DESIGN.md`), so setting this `true` changes nothing yet.
    pub embeddings_enabled: bool,
    /// Git remote URL newly-initialized memory directories are configured
    /// with, if any.
    pub git_remote: Option<String>,
    /// Whether memory writes should commit automatically rather than
    /// waiting for an explicit `prism memory commit`.
    pub auto_commit: bool,
}

impl Default for GlobalMemorySettings {
    fn default() -> Self {
        Self { embeddings_enabled: false, git_remote: None, auto_commit: false }
    }
}

impl GlobalConfig {
    /// `~/.prism/prism.config.yaml`, resolved against the current user's
    /// home directory.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::InvalidConfig("could not resolve home directory".into()))?;
        Ok(home.join(".prism").join("prism.config.yaml"))
    }

    /// Load from `path`. A missing file is not an error: it yields defaults,
    /// mirroring how [`crate::global_config::PrismConfig`] treats an absent
    /// `prism.toml`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidConfig(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::InvalidConfig(format!("malformed {}: {e}", path.display())))
    }

    /// Resolve an LLM alias to its underlying `provider:model` string. Names
    /// with no matching alias pass through unchanged, so a caller can always
    /// hand this a raw model string without checking first.
    pub fn resolve_llm_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.llm_model_aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GlobalConfig::load(&dir.path().join("prism.config.yaml")).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn loads_yaml_with_aliases_and_memory_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.config.yaml");
        std::fs::write(
            &path,
            "llm_model_aliases:\n  fast: openai:gpt-4o-mini\nmemory:\n  embeddings_enabled: true\n  auto_commit: true\n  git_remote: git@example.com:team/memory.git\n",
        )
        .unwrap();

        let config = GlobalConfig::load(&path).unwrap();
        assert_eq!(config.resolve_llm_alias("fast"), "openai:gpt-4o-mini");
        assert_eq!(config.resolve_llm_alias("unaliased"), "unaliased");
        assert!(config.memory.embeddings_enabled);
        assert!(config.memory.auto_commit);
        assert_eq!(config.memory.git_remote.as_deref(), Some("git@example.com:team/memory.git"));
    }

    #[test]
    fn malformed_yaml_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.config.yaml");
        std::fs::write(&path, "tool_registry: [not, a, map]\n").unwrap();
        assert!(matches!(GlobalConfig::load(&path), Err(ConfigError::InvalidConfig(_))));
    }
}
