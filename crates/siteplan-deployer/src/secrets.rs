//! Secret store backed by the process environment.

use async_trait::async_trait;
use siteplan_core::secret::{CredentialRef, SecretStore, SecretValue};
use siteplan_core::{Error, Result};

/// Resolves `env:` credential references.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, reference: &CredentialRef) -> Result<SecretValue> {
        match reference {
            CredentialRef::Env(name) => match std::env::var(name) {
                Ok(value) if !value.is_empty() => Ok(SecretValue::new(value)),
                _ => Err(Error::Secret(format!(
                    "environment variable {} is not set",
                    name
                ))),
            },
            CredentialRef::Secret(_) => Err(Error::Secret(format!(
                "no secret store configured for {}",
                reference
            ))),
        }
    }
}
