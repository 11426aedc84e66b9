//! Secure credential storage, backed by the platform keychain.
//!
//! PRISM addresses credentials by `(provider, key)` rather than the
//! skill/instance/key triple a skill-execution engine would use — a
//! provider here is an external system PRISM talks to (`"board"`,
//! `"anthropic"`, `"git-remote"`), and `key` is whatever that provider's
//! client needs (an API token, a personal access token, ...).

use std::fmt;

use keyring::Entry;
use zeroize::Zeroize;

use crate::errors::{PrismError, Result};

const SERVICE_NAME: &str = "prism";

/// Secure credential storage using the platform keychain:
/// macOS Keychain, Windows Credential Manager, or Linux Secret Service (DBus).
pub struct CredentialStore {
    service_name: String,
}

impl CredentialStore {
    /// A credential store under the default `prism` service name.
    pub fn new() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
        }
    }

    /// A credential store under a custom service name, for tests or
    /// multi-tenant deployments that must not share a keychain namespace.
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry_key(provider: &str, key: &str) -> String {
        format!("{provider}/{key}")
    }

    fn entry(&self, provider: &str, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, &Self::entry_key(provider, key))
            .map_err(|e| PrismError::ExternalUnavailable(format!("keychain unavailable: {e}")))
    }

    /// Store a credential, overwriting any existing value under the same
    /// `(provider, key)`.
    #[tracing::instrument(skip(self, value), fields(provider, key))]
    pub fn store_credential(&self, provider: &str, key: &str, value: &str) -> Result<()> {
        self.entry(provider, key)?
            .set_password(value)
            .map_err(|e| PrismError::ExternalUnavailable(format!("failed to store credential: {e}")))?;
        tracing::debug!("stored credential");
        Ok(())
    }

    /// Retrieve a credential.
    ///
    /// Returns [`PrismError::NotFound`] if no credential is stored under
    /// `(provider, key)`; callers that require the credential to operate
    /// (e.g. the Evaluator) should map that to
    /// [`PrismError::ConfigurationMissing`] themselves.
    #[tracing::instrument(skip(self), fields(provider, key))]
    pub fn get_credential(&self, provider: &str, key: &str) -> Result<SecureString> {
        let password = self.entry(provider, key)?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => {
                PrismError::NotFound(format!("no credential stored for {provider}/{key}"))
            }
            other => PrismError::ExternalUnavailable(format!("failed to retrieve credential: {other}")),
        })?;
        tracing::debug!("retrieved credential");
        Ok(SecureString::new(password))
    }

    /// Delete a credential. Deleting an absent credential is not an error.
    #[tracing::instrument(skip(self), fields(provider, key))]
    pub fn delete_credential(&self, provider: &str, key: &str) -> Result<()> {
        match self.entry(provider, key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                tracing::debug!("deleted credential");
                Ok(())
            }
            Err(e) => Err(PrismError::ExternalUnavailable(format!(
                "failed to delete credential: {e}"
            ))),
        }
    }

    /// Check whether a credential is present without exposing its value.
    pub fn has_credential(&self, provider: &str, key: &str) -> bool {
        self.entry(provider, key)
            .map(|e| e.get_password().is_ok())
            .unwrap_or(false)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A string that zeroes its backing memory on drop, returned by
/// [`CredentialStore::get_credential`] so a fetched secret never lingers in
/// memory longer than its holder.
#[derive(Clone)]
pub struct SecureString(String);

impl SecureString {
    /// Wrap a plain string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Borrow the secret value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the secret value, skipping the zeroing drop (the
    /// caller becomes responsible for it).
    pub fn into_string(mut self) -> String {
        let s = std::mem::take(&mut self.0);
        std::mem::forget(self);
        s
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Parse a `keyring://prism/{provider}/{key}` reference, as accepted in
/// `prism.toml` wherever a secret value can instead point at the keychain.
pub fn parse_keyring_reference(reference: &str) -> Result<(String, String)> {
    let prefix = "keyring://prism/";
    let path = reference
        .strip_prefix(prefix)
        .ok_or_else(|| PrismError::InvalidInput(format!("invalid keyring reference: must start with '{prefix}'")))?;

    let (provider, key) = path.split_once('/').ok_or_else(|| {
        PrismError::InvalidInput(format!(
            "invalid keyring reference format: expected '{prefix}{{provider}}/{{key}}'"
        ))
    })?;

    if provider.is_empty() || key.is_empty() {
        return Err(PrismError::InvalidInput(format!(
            "invalid keyring reference format: expected '{prefix}{{provider}}/{{key}}'"
        )));
    }

    Ok((provider.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyring_reference() {
        let (provider, key) = parse_keyring_reference("keyring://prism/board/api-token").unwrap();
        assert_eq!(provider, "board");
        assert_eq!(key, "api-token");
    }

    #[test]
    fn rejects_malformed_keyring_reference() {
        assert!(parse_keyring_reference("invalid://board/api-token").is_err());
        assert!(parse_keyring_reference("keyring://prism/only-provider").is_err());
    }

    #[test]
    fn secure_string_debug_redacts_value() {
        let secret = SecureString::new("sensitive".to_string());
        let debug_str = format!("{secret:?}");
        assert_eq!(debug_str, "SecureString([REDACTED])");
        assert!(!debug_str.contains("sensitive"));
    }

    #[test]
    fn secure_string_into_string_recovers_value() {
        let secret = SecureString::new("sensitive".to_string());
        assert_eq!(secret.into_string(), "sensitive");
    }
}
