//! Domain names and their bindings to branch environments.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::zone::HostedZone;
use crate::{Error, Result};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A validated, lowercased fully-qualified domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(input: &str) -> Result<Self> {
        let name = input.trim().trim_end_matches('.').to_lowercase();
        if name.is_empty() {
            return Err(Error::config("domain name is empty"));
        }
        if name.len() > MAX_DOMAIN_LEN {
            return Err(Error::config(format!("domain name too long: {}", name)));
        }
        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(Error::config(format!(
                "domain name '{}' is not fully qualified",
                name
            )));
        }
        for label in &labels {
            let valid = !label.is_empty()
                && label.len() <= MAX_LABEL_LEN
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            if !valid {
                return Err(Error::config(format!(
                    "invalid label '{}' in domain name '{}'",
                    label, name
                )));
            }
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `self` equals `zone` or sits underneath it.
    pub fn is_within(&self, zone: &DomainName) -> bool {
        self.0 == zone.0
            || self
                .0
                .strip_suffix(zone.0.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

impl TryFrom<String> for DomainName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

impl std::str::FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Certificate issuance state. Advanced only by reconciliation against the
/// hosting platform; declaring a binding never waits for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CertificateStatus {
    #[default]
    Pending,
    Validating,
    Validated,
    Failed {
        reason: String,
    },
}

impl CertificateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CertificateStatus::Validated | CertificateStatus::Failed { .. }
        )
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::Pending => write!(f, "pending"),
            CertificateStatus::Validating => write!(f, "validating"),
            CertificateStatus::Validated => write!(f, "validated"),
            CertificateStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Assignment of a domain name to exactly one branch environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBinding {
    pub domain: DomainName,
    pub target: String,
    /// Whether the bare domain itself serves the target.
    pub root_mapping: bool,
    pub zone: HostedZone,
    pub certificate: CertificateStatus,
    pub certificate_checked_at: Option<DateTime<Utc>>,
}

impl DomainBinding {
    pub(crate) fn new(
        domain: DomainName,
        target: &str,
        root_mapping: bool,
        zone: HostedZone,
    ) -> Self {
        Self {
            domain,
            target: target.to_string(),
            root_mapping,
            zone,
            certificate: CertificateStatus::Pending,
            certificate_checked_at: None,
        }
    }

    pub fn custom_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}
