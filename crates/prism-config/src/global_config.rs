//! `prism.toml`: the optional project-wide configuration file for ranker
//! weights, context-injector budgets, the evaluator's LLM backend choice,
//! and the board adapter's connection details.
//!
//! Every field has a default matching the corresponding component's own
//! built-in default (`RankerWeights::default()`, `InjectorConfig::default()`,
//! ...), so an absent or partial `prism.toml` is always valid: this file only
//! ever *overrides*, never *requires*.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Result;

/// Root configuration, as loaded from `prism.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismConfig {
    /// Ranker component weights.
    #[serde(default)]
    pub ranker: RankerSettings,
    /// Context Injector token budgets.
    #[serde(default)]
    pub injector: InjectorSettings,
    /// Evaluator LLM backend selection.
    #[serde(default)]
    pub evaluator: EvaluatorSettings,
    /// Board Adapter connection settings.
    #[serde(default)]
    pub board: BoardSettings,
    /// Memory Sync git remote credentials.
    #[serde(default)]
    pub memory: MemorySettings,
}

impl PrismConfig {
    /// Load from a TOML file on disk. A missing file is not an error at this
    /// layer; callers that want "no file means defaults" should check
    /// existence themselves and fall back to [`PrismConfig::default`].
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    ///
    /// Accepts both a wrapped document (everything under a top-level
    /// `[prism]` table) and a bare one (`[ranker]`, `[injector]`, ... at the
    /// document root), mirroring how operators tend to either dedicate a
    /// whole file to this config or fold it into a larger one.
    pub fn from_toml(content: &str) -> Result<Self> {
        let is_wrapped = content.contains("[prism]") || content.contains("[prism.");

        if is_wrapped {
            #[derive(Deserialize)]
            struct Wrapper {
                #[serde(default)]
                prism: Option<PrismConfig>,
            }
            let wrapper: Wrapper = toml::from_str(content)?;
            Ok(wrapper.prism.unwrap_or_default())
        } else {
            Ok(toml::from_str(content)?)
        }
    }

    /// Apply `PRISM_`-prefixed environment variable overrides on top of
    /// whatever was loaded from the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PRISM_RANKER_LEX_WEIGHT") {
            if let Ok(w) = val.parse() {
                self.ranker.lex = w;
            }
        }
        if let Ok(val) = std::env::var("PRISM_RANKER_SEM_WEIGHT") {
            if let Ok(w) = val.parse() {
                self.ranker.sem = w;
            }
        }
        if let Ok(val) = std::env::var("PRISM_RANKER_TAG_WEIGHT") {
            if let Ok(w) = val.parse() {
                self.ranker.tag = w;
            }
        }
        if let Ok(val) = std::env::var("PRISM_RANKER_REUSE_WEIGHT") {
            if let Ok(w) = val.parse() {
                self.ranker.reuse = w;
            }
        }
        if let Ok(val) = std::env::var("PRISM_RANKER_RECENCY_WEIGHT") {
            if let Ok(w) = val.parse() {
                self.ranker.recency = w;
            }
        }
        if let Ok(val) = std::env::var("PRISM_INJECTOR_BUDGET_TOKENS") {
            if let Ok(n) = val.parse() {
                self.injector.budget_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("PRISM_INJECTOR_PER_TASK_BUDGET_TOKENS") {
            if let Ok(n) = val.parse() {
                self.injector.per_task_budget_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("PRISM_EVALUATOR_PROVIDER") {
            self.evaluator.provider = Some(val);
        }
        if let Ok(val) = std::env::var("PRISM_EVALUATOR_MODEL") {
            self.evaluator.model = Some(val);
        }
        if let Ok(val) = std::env::var("PRISM_BOARD_BASE_URL") {
            self.board.base_url = Some(val);
        }
        if let Ok(val) = std::env::var("PRISM_BOARD_API_TOKEN_ENV") {
            self.board.api_token_env = Some(val);
        }
        if let Ok(val) = std::env::var("PRISM_MEMORY_GIT_USERNAME_ENV") {
            self.memory.git_username_env = Some(val);
        }
        if let Ok(val) = std::env::var("PRISM_MEMORY_GIT_TOKEN_ENV") {
            self.memory.git_token_env = Some(val);
        }
        self
    }

    /// Reject configurations that can never produce a usable ranking.
    pub fn validate(&self) -> Result<()> {
        let w = &self.ranker;
        if w.lex < 0.0 || w.sem < 0.0 || w.tag < 0.0 || w.reuse < 0.0 || w.recency < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "ranker weights must all be non-negative".into(),
            ));
        }
        if self.injector.per_task_budget_tokens > self.injector.budget_tokens {
            return Err(ConfigError::InvalidConfig(
                "injector.per_task_budget_tokens cannot exceed injector.budget_tokens".into(),
            ));
        }
        Ok(())
    }
}

/// Mirrors `prism_core::ranker::RankerWeights`; kept as a separate, plain
/// type here so this crate doesn't need to depend on `prism-core` just to
/// parse a config file. Callers convert with `.into()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerSettings {
    /// Weight for the lexical (BM25) component.
    pub lex: f32,
    /// Weight for the semantic (embedding) component.
    pub sem: f32,
    /// Weight for the domain-tag affinity component.
    pub tag: f32,
    /// Weight for the reuse-count component.
    pub reuse: f32,
    /// Weight for the recency component.
    pub recency: f32,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self { lex: 1.0, sem: 1.0, tag: 3.0, reuse: 2.0, recency: 1.5 }
    }
}

/// Mirrors `prism_core::injector::InjectorConfig` plus the Task Augmenter's
/// separate per-task budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorSettings {
    /// Total token budget for a full `prism inject` artifact.
    pub budget_tokens: usize,
    /// Token budget for the context block appended to a single task.
    pub per_task_budget_tokens: usize,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self { budget_tokens: 4000, per_task_budget_tokens: 500 }
    }
}

/// Which LLM backend the Evaluator should build, and with which model. Both
/// fields are optional: `Evaluator::from_env` already has its own
/// feature-gated fallback order, this just lets a `prism.toml` pin one
/// explicitly instead of relying on whichever credential happens to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
    /// `"openai"` or `"ollama"`.
    pub provider: Option<String>,
    /// Model name passed to the chosen backend.
    pub model: Option<String>,
}

/// Where the Board Adapter's HTTP client points, and which environment
/// variable holds its bearer token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    /// Base URL of the board's REST API.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the board API token.
    pub api_token_env: Option<String>,
}

/// Which environment variables hold the memory directory's git remote
/// credentials, resolved the same way as [`BoardSettings::api_token_env`].
/// Absent means push/pull rely on whatever anonymous or ssh-agent access
/// the remote allows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Name of the environment variable holding the git username (for
    /// token auth, often a fixed placeholder like `x-access-token`).
    pub git_username_env: Option<String>,
    /// Name of the environment variable holding the git password or
    /// personal access token.
    pub git_token_env: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PrismConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_wrapped_and_bare_forms() {
        let wrapped = r#"
[prism.ranker]
tag = 5.0
"#;
        let bare = r#"
[ranker]
tag = 5.0
"#;
        assert_eq!(
            PrismConfig::from_toml(wrapped).unwrap().ranker.tag,
            PrismConfig::from_toml(bare).unwrap().ranker.tag
        );
        assert_eq!(PrismConfig::from_toml(bare).unwrap().ranker.tag, 5.0);
    }

    #[test]
    fn rejects_negative_weight() {
        let toml = "[ranker]\nlex = -1.0\n";
        let config = PrismConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_budgets() {
        let toml = "[injector]\nbudget_tokens = 100\nper_task_budget_tokens = 200\n";
        let config = PrismConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_wins_over_file() {
        std::env::set_var("PRISM_RANKER_TAG_WEIGHT", "9.5");
        let config = PrismConfig::default().with_env_overrides();
        std::env::remove_var("PRISM_RANKER_TAG_WEIGHT");
        assert_eq!(config.ranker.tag, 9.5);
    }
}
