//! Platform keychain secret provider.
//!
//! Uses the system keychain for secure secret storage:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (via DBus)

use async_trait::async_trait;
use keyring::Entry;
use zeroize::Zeroizing;

use super::{SecretProvider, SecretValue};
use crate::ConfigError;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "prism-config";

/// Secret provider that uses the platform keychain.
pub struct KeychainProvider {
    /// Optional prefix for all keys.
    prefix: Option<String>,
}

impl KeychainProvider {
    /// Create a new keychain provider.
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Create a new keychain provider with a key prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Build the keyring user/key identifier.
    fn build_key(&self, context_id: &str, key: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}/{}/{}/{}", p, SERVICE_NAME, context_id, key),
            None => format!("{}/{}/{}", SERVICE_NAME, context_id, key),
        }
    }

    /// Get a keyring entry.
    fn get_entry(&self, context_id: &str, key: &str) -> Result<Entry, ConfigError> {
        let user = self.build_key(context_id, key);
        Entry::new(SERVICE_NAME, &user).map_err(|e| {
            ConfigError::SecretProvider(format!("Failed to create keyring entry: {}", e))
        })
    }
}

impl Default for KeychainProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretProvider for KeychainProvider {
    async fn get_secret(
        &self,
        context_id: &str,
        key: &str,
    ) -> Result<Option<SecretValue>, ConfigError> {
        let entry = self.get_entry(context_id, key)?;

        match entry.get_password() {
            Ok(password) => {
                tracing::debug!(
                    context_id = context_id,
                    key = key,
                    "Retrieved secret from keychain"
                );
                Ok(Some(Zeroizing::new(password)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                tracing::warn!(
                    context_id = context_id,
                    key = key,
                    error = %e,
                    "Failed to get secret from keychain"
                );
                Err(ConfigError::SecretProvider(format!(
                    "Failed to get secret '{}' from keychain: {}",
                    key, e
                )))
            }
        }
    }

    async fn set_secret(
        &self,
        context_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let entry = self.get_entry(context_id, key)?;

        entry.set_password(value).map_err(|e| {
            tracing::error!(
                context_id = context_id,
                key = key,
                error = %e,
                "Failed to set secret in keychain"
            );
            ConfigError::SecretProvider(format!(
                "Failed to set secret '{}' in keychain: {}",
                key, e
            ))
        })?;

        tracing::info!(
            context_id = context_id,
            key = key,
            "Stored secret in keychain"
        );

        Ok(())
    }

    async fn delete_secret(&self, context_id: &str, key: &str) -> Result<(), ConfigError> {
        let entry = self.get_entry(context_id, key)?;

        match entry.delete_credential() {
            Ok(()) => {
                tracing::info!(
                    context_id = context_id,
                    key = key,
                    "Deleted secret from keychain"
                );
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                // Already doesn't exist, that's fine
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    context_id = context_id,
                    key = key,
                    error = %e,
                    "Failed to delete secret from keychain"
                );
                Err(ConfigError::SecretProvider(format!(
                    "Failed to delete secret '{}' from keychain: {}",
                    key, e
                )))
            }
        }
    }

    async fn list_keys(&self, _context_id: &str) -> Result<Vec<String>, ConfigError> {
        // The keyring crate doesn't support listing keys
        // This would require platform-specific implementations
        tracing::warn!("Listing keys is not supported by the keychain provider");
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "keychain"
    }
}
