//! Error types for siteplan.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("branch '{0}' is already registered")]
    DuplicateBranch(String),

    #[error("domain conflict on '{domain}': {message}")]
    DomainConflict { domain: String, message: String },

    #[error("domain '{0}' does not belong to any reachable hosted zone")]
    UnresolvedZone(String),

    #[error("unknown target branch: {0}")]
    UnknownTarget(String),

    #[error("secret error: {0}")]
    Secret(String),

    #[error("platform error: {0}")]
    Platform(String),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
