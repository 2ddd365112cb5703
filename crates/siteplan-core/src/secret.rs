//! Secret storage abstraction for source repository credentials.
//!
//! Descriptors only ever hold a [`CredentialRef`]. The token itself is
//! resolved at apply time into a [`SecretValue`], which refuses to print.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Where a credential is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum CredentialRef {
    /// A process environment variable.
    Env(String),
    /// A path in a secret store.
    Secret(String),
}

impl CredentialRef {
    pub fn name(&self) -> &str {
        match self {
            CredentialRef::Env(name) | CredentialRef::Secret(name) => name,
        }
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRef::Env(name) => write!(f, "env:{}", name),
            CredentialRef::Secret(path) => write!(f, "secret:{}", path),
        }
    }
}

impl std::str::FromStr for CredentialRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| Error::config(format!("credential reference '{}' has no kind", s)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::config("credential reference has an empty name"));
        }
        match kind {
            "env" => Ok(CredentialRef::Env(name.to_string())),
            "secret" => Ok(CredentialRef::Secret(name.to_string())),
            other => Err(Error::config(format!(
                "unknown credential kind '{}' (expected env or secret)",
                other
            ))),
        }
    }
}

/// A resolved secret. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret for handing to a provider client.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Trait for secret storage backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Resolve a credential reference to its value.
    async fn get(&self, reference: &CredentialRef) -> Result<SecretValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credential_ref() {
        let env: CredentialRef = "env:GITHUB_TOKEN".parse().unwrap();
        assert_eq!(env, CredentialRef::Env("GITHUB_TOKEN".to_string()));
        assert_eq!(env.to_string(), "env:GITHUB_TOKEN");

        let secret: CredentialRef = "secret:github/token".parse().unwrap();
        assert_eq!(secret.name(), "github/token");
    }

    #[test]
    fn test_parse_credential_ref_rejects_garbage() {
        assert!("GITHUB_TOKEN".parse::<CredentialRef>().is_err());
        assert!("env:".parse::<CredentialRef>().is_err());
        assert!("vault:x".parse::<CredentialRef>().is_err());
    }

    #[test]
    fn test_secret_value_is_redacted() {
        let value = SecretValue::new("ghp_supersecret");
        assert_eq!(format!("{}", value), "***");
        assert!(!format!("{:?}", value).contains("supersecret"));
        assert_eq!(value.expose(), "ghp_supersecret");
    }
}
