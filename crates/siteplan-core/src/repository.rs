//! Source repository identity.

use serde::{Deserialize, Serialize};

use crate::secret::CredentialRef;
use crate::{Error, Result};

/// Git provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
}

impl std::fmt::Display for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitProvider::Github => write!(f, "github"),
            GitProvider::Gitlab => write!(f, "gitlab"),
            GitProvider::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl std::str::FromStr for GitProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "github" => Ok(GitProvider::Github),
            "gitlab" => Ok(GitProvider::Gitlab),
            "bitbucket" => Ok(GitProvider::Bitbucket),
            _ => Err(Error::config(format!("unknown git provider: {}", s))),
        }
    }
}

/// The repository a descriptor builds from.
///
/// Holds a reference to the access token, never the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepository {
    pub provider: GitProvider,
    pub owner: String,
    pub repository: String,
    pub credential: Option<CredentialRef>,
}

impl SourceRepository {
    pub fn github(
        owner: impl Into<String>,
        repository: impl Into<String>,
        credential: CredentialRef,
    ) -> Self {
        Self {
            provider: GitProvider::Github,
            owner: owner.into(),
            repository: repository.into(),
            credential: Some(credential),
        }
    }

    /// `owner/repository`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// Check that owner, repository and credential are all present.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::config("source repository owner is required"));
        }
        if self.repository.trim().is_empty() {
            return Err(Error::config("source repository name is required"));
        }
        if self.credential.is_none() {
            return Err(Error::config(format!(
                "source repository '{}' has no access credential",
                self.full_name()
            )));
        }
        Ok(())
    }
}
