//! Redirect/rewrite rules and custom response headers.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a custom redirect or rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectStatus {
    #[serde(rename = "301")]
    Permanent,
    #[serde(rename = "302")]
    Temporary,
    #[serde(rename = "200")]
    Rewrite,
    #[serde(rename = "404")]
    NotFound,
    /// Serve the target with a 200 when the source is missing.
    #[serde(rename = "404-200")]
    NotFoundRewrite,
}

impl std::fmt::Display for RedirectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectStatus::Permanent => write!(f, "301"),
            RedirectStatus::Temporary => write!(f, "302"),
            RedirectStatus::Rewrite => write!(f, "200"),
            RedirectStatus::NotFound => write!(f, "404"),
            RedirectStatus::NotFoundRewrite => write!(f, "404-200"),
        }
    }
}

impl std::str::FromStr for RedirectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "301" | "permanent" => Ok(RedirectStatus::Permanent),
            "302" | "temporary" => Ok(RedirectStatus::Temporary),
            "200" | "rewrite" => Ok(RedirectStatus::Rewrite),
            "404" | "not-found" => Ok(RedirectStatus::NotFound),
            "404-200" | "not-found-rewrite" => Ok(RedirectStatus::NotFoundRewrite),
            _ => Err(Error::config(format!("unknown redirect status: {}", s))),
        }
    }
}

/// An app-wide redirect or rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub source: String,
    pub target: String,
    pub status: RedirectStatus,
}

impl CustomRule {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        status: RedirectStatus,
    ) -> Result<Self> {
        let source = source.into();
        let target = target.into();
        if source.trim().is_empty() || target.trim().is_empty() {
            return Err(Error::config("custom rule needs a source and a target"));
        }
        Ok(Self {
            source,
            target,
            status,
        })
    }

    /// Single-page-app fallback: unknown paths render `/index.html`.
    pub fn spa_fallback() -> Self {
        Self {
            source: "/<*>".to_string(),
            target: "/index.html".to_string(),
            status: RedirectStatus::NotFoundRewrite,
        }
    }
}

/// Headers attached to every response whose path matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    pub pattern: String,
    pub headers: Vec<Header>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}
