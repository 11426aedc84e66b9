use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "PRISM - the context broker between a board, a memory store, and AI coding agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(short = 'p', long = "project", global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new PRISM project (`.prism/project.yaml` and `memory/`)
    Init {
        /// Project name (default: the directory name)
        name: Option<String>,
    },

    /// Manage Skills in the Skill Store
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Rank and pack Skills into a project-wide context artifact
    Inject {
        /// Query to rank Skills against (default: the project's stack tags)
        #[arg(short = 'q', long)]
        query: Option<String>,

        /// Extra domain tags to rank against, in addition to the project's
        /// stack tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Token budget override (default: `prism.toml`'s `[injector]` setting)
        #[arg(short = 'b', long)]
        budget: Option<usize>,
    },

    /// Augment a task document with ranked Skill context
    Augment {
        /// Path to the task Markdown file
        path: PathBuf,

        /// Overwrite even if the existing `.prism.md` sibling was hand-edited
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Board Adapter operations
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },

    /// Run the Event Router: webhook listener, file watcher, worker pool
    Serve {
        /// Interface to bind the webhook listener to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind the webhook listener to
        #[arg(long)]
        port: Option<u16>,

        /// Directory the file watcher observes recursively for task-file
        /// changes (default: `<project>/specs`)
        #[arg(long)]
        specs_dir: Option<PathBuf>,
    },

    /// Memory Sync operations against the memory directory's git remote
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Ask the Evaluator for a verdict on a candidate Skill
    Evaluate {
        /// Path to the candidate Skill file
        path: PathBuf,

        /// Apply the verdict to the Store instead of only printing it
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// Store a Skill file (created or updated) in the Skill Store
    Put {
        /// Path to a Skill Markdown file
        path: PathBuf,
    },

    /// Print one Skill by id
    Get {
        /// `skill_id`
        id: String,
    },

    /// List Skills, optionally filtered
    #[command(alias = "ls")]
    List {
        /// Only Skills with this `type` (skill, pattern, gotcha, decision)
        #[arg(short = 't', long)]
        skill_type: Option<String>,

        /// Only Skills with this domain tag
        #[arg(long)]
        tag: Option<String>,

        /// Include deprecated/conflicted Skills too (default: active only)
        #[arg(long)]
        all: bool,
    },

    /// Rank Skills against a free-text query
    Search {
        /// Query text
        query: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// Create a board task for every internal task not yet mapped
    Sync {
        /// Path to the task document
        tasks: PathBuf,

        /// The project's board id
        #[arg(long)]
        board_id: String,

        /// Compute and print the plan without creating anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show pending changes in the memory directory
    Status,

    /// Stage and commit pending changes
    Commit {
        /// Short summary for the commit message
        summary: String,
    },

    /// Push the memory directory's current branch to its remote
    Push {
        /// Remote name
        #[arg(default_value = "origin")]
        remote: String,
    },

    /// Fetch and fast-forward the memory directory's current branch
    Pull {
        /// Remote name
        #[arg(default_value = "origin")]
        remote: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let project_root = cli.project.unwrap_or(std::env::current_dir()?);

    let result = match cli.command {
        Commands::Init { name } => commands::init::execute(&project_root, name.as_deref()),
        Commands::Skill { action } => match action {
            SkillAction::Put { path } => commands::skill::put(&project_root, &path),
            SkillAction::Get { id } => commands::skill::get(&project_root, &id),
            SkillAction::List { skill_type, tag, all } => {
                commands::skill::list(&project_root, skill_type.as_deref(), tag.as_deref(), all)
            }
            SkillAction::Search { query, limit } => commands::skill::search(&project_root, &query, limit),
        },
        Commands::Inject { query, tags, budget } => {
            commands::inject::execute(&project_root, query.as_deref(), &tags, budget)
        }
        Commands::Augment { path, force } => commands::augment::execute(&project_root, &path, force),
        Commands::Board { action } => match action {
            BoardAction::Sync { tasks, board_id, dry_run } => {
                commands::board::sync(&project_root, &tasks, &board_id, dry_run).await
            }
        },
        Commands::Serve { host, port, specs_dir } => {
            commands::serve::execute(&project_root, host, port, specs_dir).await
        }
        Commands::Memory { action } => match action {
            MemoryAction::Status => commands::memory::status(&project_root),
            MemoryAction::Commit { summary } => commands::memory::commit(&project_root, &summary),
            MemoryAction::Push { remote } => commands::memory::push(&project_root, &remote).await,
            MemoryAction::Pull { remote } => commands::memory::pull(&project_root, &remote).await,
        },
        Commands::Evaluate { path, apply } => commands::evaluate::execute(&project_root, &path, apply).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "Caused by:".dimmed(), cause);
        }
        std::process::exit(exit_code_for(&e));
    }

    Ok(())
}

/// Map the error taxonomy onto process exit codes: 0 success, 1 general
/// error, 2 configuration missing, 3 external service unavailable, 4
/// invariant violation.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    use prism_config::ConfigError;
    use prism_core::errors::PrismError;

    // `.context(...)` wraps the original error without erasing it from the
    // chain, so walk the whole chain rather than only the outermost layer.
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<PrismError>() {
            return match e {
                PrismError::ConfigurationMissing(_) => 2,
                PrismError::ExternalUnavailable(_) => 3,
                PrismError::InvariantViolation(_) => 4,
                PrismError::NotFound(_)
                | PrismError::InvalidInput(_)
                | PrismError::Conflict(_)
                | PrismError::Cancelled(_) => 1,
            };
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return match e {
                ConfigError::SecretNotFound(_) | ConfigError::RequiredSecretNotSet(_) => 2,
                ConfigError::SecretProvider(_) => 3,
                ConfigError::InvalidConfig(_) | ConfigError::Io(_) | ConfigError::Serialization(_) => 1,
            };
        }
    }
    1
}
