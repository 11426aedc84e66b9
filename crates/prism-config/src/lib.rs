//! Project and global configuration, secrets resolution, and the shared
//! application context for PRISM.
//!
//! This crate provides:
//!
//! - [`global_config::PrismConfig`]: the optional per-project `prism.toml`
//!   file that overrides Ranker weights, Context Injector budgets, the
//!   Evaluator's LLM backend choice, and the Board Adapter's connection
//!   details.
//! - [`global::GlobalConfig`]: the user-wide `~/.prism/prism.config.yaml`
//!   file — tool registry, LLM model aliases, default agent-role
//!   assignments, and memory-wide options — shared across every project.
//! - [`secrets`] + [`providers`]: a pluggable credential-resolution chain
//!   (environment variable, then config file, then OS keychain) used to
//!   resolve board API tokens, evaluator LLM keys, and git remote
//!   credentials without ever hardcoding them.
//! - [`app_context::AppContext`]: the handles constructed once at startup
//!   and threaded through every PRISM entry point (CLI, HTTP server, Event
//!   Router).
//!
//! # Example
//!
//! ```no_run
//! use prism_config::AppContext;
//!
//! let ctx = AppContext::open(".").expect("failed to open PRISM context");
//! println!("ranking with tag weight {}", ctx.config.ranker.tag);
//! ```
//!
//! # Example: resolving a secret
//!
//! ```rust
//! use prism_config::providers::{EnvironmentProvider, SecretProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = EnvironmentProvider::new("PRISM_");
//! let token = provider.get_secret("board", "API_TOKEN").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod app_context;
pub mod global;
pub mod global_config;
pub mod providers;
pub mod secrets;

pub use app_context::AppContext;
pub use global::{GlobalConfig, GlobalMemorySettings, ToolDescriptor};
pub use global_config::{
    BoardSettings, EvaluatorSettings, InjectorSettings, MemorySettings, PrismConfig, RankerSettings,
};
pub use secrets::{
    ExternalSecretProvider, SecretDefinition, SecretFileFormat, SecretInjectionTarget,
    SecretProviderConfig, SecretsConfig,
};

// Re-export provider types
pub use providers::{
    EnvironmentProvider, FileProvider, KeychainProvider, SecretManager, SecretProvider,
    SecretValue,
};

/// Error types for this crate.
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while loading configuration or resolving
    /// secrets.
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Configuration value failed validation.
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        /// A secret was requested but none of the configured providers had
        /// it.
        #[error("Secret not found: {0}")]
        SecretNotFound(String),

        /// A secret marked `required` in a [`crate::secrets::SecretsConfig`]
        /// was never resolved.
        #[error("Required secret not set: {0}")]
        RequiredSecretNotSet(String),

        /// IO error.
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        /// Serialization error.
        #[error("Serialization error: {0}")]
        Serialization(String),

        /// Secret provider error.
        #[error("Secret provider error: {0}")]
        SecretProvider(String),
    }

    impl From<serde_json::Error> for ConfigError {
        fn from(e: serde_json::Error) -> Self {
            Self::Serialization(e.to_string())
        }
    }

    impl From<toml::de::Error> for ConfigError {
        fn from(e: toml::de::Error) -> Self {
            Self::Serialization(e.to_string())
        }
    }

    impl From<toml::ser::Error> for ConfigError {
        fn from(e: toml::ser::Error) -> Self {
            Self::Serialization(e.to_string())
        }
    }
}

pub use error::ConfigError;

/// Result type for this crate's operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
