//! `AppContext`: the handles every PRISM entry point (CLI commands, the
//! HTTP server, the Event Router) is built from.
//!
//! Constructed once at startup from a project root plus a loaded
//! [`PrismConfig`], mirroring the donor's single-construction-point
//! `AppState` in `skill-http/src/server.rs` — the optional pieces
//! (evaluator, board client, memory sync) are built lazily there too, and
//! `AppContext` follows the same shape: required state up front, optional
//! integrations added only once their credentials are actually available.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prism_board::{BoardClient, HttpBoardClient};
use prism_core::memory_sync::{GitCredentials, MemorySync};
use prism_core::store::SkillStore;

use crate::error::ConfigError;
use crate::global::GlobalConfig;
use crate::global_config::PrismConfig;
use crate::Result;

const PRISM_MD_TEMPLATE: &str = "# PRISM\n\n\
Free-form briefing for this project. Edit this file by hand; PRISM never\n\
overwrites it. Use it for anything the Ranker's domain tags and stack\n\
context don't capture on their own: conventions, pitfalls, links to\n\
runbooks, whatever the next agent picking up a task should know first.\n";

/// Shared state threaded through every PRISM surface.
pub struct AppContext {
    /// Root directory of the PRISM-managed project.
    pub project_root: PathBuf,
    /// Loaded and validated per-project configuration (`prism.toml`).
    pub config: PrismConfig,
    /// Loaded user-wide configuration (`~/.prism/prism.config.yaml`),
    /// shared across every project on the machine.
    pub global: GlobalConfig,
    /// The Skill Store, opened against `<project_root>/memory` by convention.
    pub store: Arc<SkillStore>,
    /// Board Adapter client, present only when `config.board.base_url` and a
    /// token (if required) are both resolvable.
    pub board_client: Option<Arc<dyn BoardClient>>,
    /// Memory Sync handle, present only when `project_root/memory` is a git
    /// repository.
    pub memory_sync: Option<Arc<MemorySync>>,
}

impl AppContext {
    /// Build the context for `project_root`, loading `prism.toml` from it if
    /// present (falling back to defaults otherwise), loading the user-wide
    /// `~/.prism/prism.config.yaml`, and opening the Skill Store. Optional
    /// integrations are attempted but never fatal: a missing board token or
    /// an unversioned memory directory simply leaves the corresponding field
    /// `None` rather than failing startup.
    pub fn open(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let config = load_config(&project_root)?;
        config.validate()?;
        let global = load_global_config()?;

        ensure_project_docs(&project_root, &global)?;

        let memory_root = project_root.join("memory");
        let store = Arc::new(
            SkillStore::open(&memory_root)
                .map_err(|e| ConfigError::InvalidConfig(format!("failed to open skill store: {e}")))?,
        );

        let board_client = build_board_client(&config);
        let memory_sync = MemorySync::open(&memory_root).ok().map(|sync| {
            Arc::new(match memory_git_credentials(&config) {
                Some(creds) => sync.with_credentials(creds),
                None => sync,
            })
        });

        Ok(Self { project_root, config, global, store, board_client, memory_sync })
    }

    /// Path PRISM's own project manifest (`.prism/project.yaml`) lives
    /// under, for callers that need it directly rather than through
    /// `prism_core::project::Project`.
    pub fn prism_dir(&self) -> PathBuf {
        self.project_root.join(".prism")
    }
}

/// `PRISM_GLOBAL_CONFIG_PATH` overrides the default `~/.prism/prism.config.yaml`
/// location, for tests and for machines without a conventional home
/// directory.
const GLOBAL_CONFIG_PATH_ENV: &str = "PRISM_GLOBAL_CONFIG_PATH";

fn load_global_config() -> Result<GlobalConfig> {
    if let Ok(path) = std::env::var(GLOBAL_CONFIG_PATH_ENV) {
        return GlobalConfig::load(Path::new(&path));
    }
    match GlobalConfig::default_path() {
        Ok(path) => GlobalConfig::load(&path),
        // No resolvable home directory: proceed with defaults rather than
        // fail every project open over a machine-wide file nothing requires.
        Err(_) => Ok(GlobalConfig::default()),
    }
}

/// Create `.prism/PRISM.md` and `.prism/AGENTS.md` the first time a project
/// is opened, if they don't exist yet. `AGENTS.md` is seeded from the global
/// `agent_roles` assignment so a project starts with the same schema it can
/// then override.
fn ensure_project_docs(project_root: &Path, global: &GlobalConfig) -> Result<()> {
    let prism_dir = project_root.join(".prism");
    std::fs::create_dir_all(&prism_dir)
        .map_err(|e| ConfigError::InvalidConfig(format!("failed to create {}: {e}", prism_dir.display())))?;

    let prism_md = prism_dir.join("PRISM.md");
    if !prism_md.exists() {
        std::fs::write(&prism_md, PRISM_MD_TEMPLATE)
            .map_err(|e| ConfigError::InvalidConfig(format!("failed to write {}: {e}", prism_md.display())))?;
    }

    let agents_md = prism_dir.join("AGENTS.md");
    if !agents_md.exists() {
        let body = render_agents_md(global);
        std::fs::write(&agents_md, body)
            .map_err(|e| ConfigError::InvalidConfig(format!("failed to write {}: {e}", agents_md.display())))?;
    }
    Ok(())
}

fn render_agents_md(global: &GlobalConfig) -> String {
    let mut body = String::from(
        "# Agents\n\n\
         Per-project overrides of the global `agent_roles` assignment\n\
         (`~/.prism/prism.config.yaml`). Same schema: one `role: assignment`\n\
         line per role this project wants to pin to something other than\n\
         the global default.\n\n",
    );
    if global.agent_roles.is_empty() {
        body.push_str("<!-- no global agent_roles configured; add role: assignment lines below -->\n");
    } else {
        for (role, assignment) in &global.agent_roles {
            body.push_str(&format!("# {role}: {assignment}  (global default, override by uncommenting)\n"));
        }
    }
    body
}

fn load_config(project_root: &Path) -> Result<PrismConfig> {
    let config_path = project_root.join("prism.toml");
    let config = if config_path.exists() {
        PrismConfig::from_toml_file(&config_path)?
    } else {
        PrismConfig::default()
    };
    Ok(config.with_env_overrides())
}

fn build_board_client(config: &PrismConfig) -> Option<Arc<dyn BoardClient>> {
    let base_url = config.board.base_url.clone()?;
    let token = config
        .board
        .api_token_env
        .as_ref()
        .and_then(|var| std::env::var(var).ok());
    HttpBoardClient::new(base_url, token)
        .ok()
        .map(|c| Arc::new(c) as Arc<dyn BoardClient>)
}

/// Resolve the memory directory's git remote credentials from the
/// environment variables `prism.toml`'s `[memory]` section names. Both must
/// be present and non-empty; a partially configured pair is treated as
/// absent rather than an error, since push/pull against a public or
/// ssh-agent-authenticated remote needs neither.
fn memory_git_credentials(config: &PrismConfig) -> Option<GitCredentials> {
    let username = config
        .memory
        .git_username_env
        .as_ref()
        .and_then(|var| std::env::var(var).ok())?;
    let password = config
        .memory
        .git_token_env
        .as_ref()
        .and_then(|var| std::env::var(var).ok())?;
    Some(GitCredentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensures_prism_md_and_agents_md_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::open(dir.path()).unwrap();
        assert!(ctx.prism_dir().join("PRISM.md").exists());
        assert!(ctx.prism_dir().join("AGENTS.md").exists());
    }

    #[test]
    fn global_config_path_env_override_is_honored() {
        let config_dir = tempfile::tempdir().unwrap();
        let config_path = config_dir.path().join("prism.config.yaml");
        std::fs::write(
            &config_path,
            "agent_roles:\n  reviewer: claude\nmemory:\n  auto_commit: true\n",
        )
        .unwrap();
        std::env::set_var(GLOBAL_CONFIG_PATH_ENV, &config_path);

        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::open(dir.path()).unwrap();
        std::env::remove_var(GLOBAL_CONFIG_PATH_ENV);

        assert_eq!(ctx.global.agent_roles.get("reviewer").map(String::as_str), Some("claude"));
        assert!(ctx.global.memory.auto_commit);
        let agents_md = std::fs::read_to_string(ctx.prism_dir().join("AGENTS.md")).unwrap();
        assert!(agents_md.contains("reviewer: claude"));
    }

    #[test]
    fn opens_with_defaults_when_no_config_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::open(dir.path()).unwrap();
        assert_eq!(ctx.config.injector.budget_tokens, 4000);
        assert!(ctx.board_client.is_none());
        assert!(ctx.memory_sync.is_none());
    }

    #[test]
    fn loads_prism_toml_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("prism.toml"),
            "[ranker]\ntag = 9.0\n\n[board]\nbase_url = \"https://board.example.com\"\n",
        )
        .unwrap();

        let ctx = AppContext::open(dir.path()).unwrap();
        assert_eq!(ctx.config.ranker.tag, 9.0);
        assert!(ctx.board_client.is_some());
    }
}
