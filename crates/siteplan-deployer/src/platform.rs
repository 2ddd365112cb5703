//! Traits for the external systems a descriptor is applied to, and the
//! declarations handed to them.

use async_trait::async_trait;
use serde::Serialize;
use siteplan_core::environment::{EnvVars, Stage};
use siteplan_core::rule::HeaderRule;
use siteplan_core::secret::SecretValue;
use siteplan_core::{
    AppIdentity, ApplicationDescriptor, BranchEnvironment, CertificateStatus, CustomRule,
    DomainBinding, DomainName, GitProvider, HostedZone, Result, SourceRepository,
};

/// Application-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDeclaration {
    pub name: String,
    pub provider: GitProvider,
    pub owner: String,
    pub repository: String,
    /// Resolved source access token. Redacted in `Debug`.
    pub access_token: SecretValue,
    pub env_vars: EnvVars,
    pub custom_rules: Vec<CustomRule>,
    pub auto_branch_deletion: bool,
}

impl AppDeclaration {
    pub fn from_descriptor(descriptor: &ApplicationDescriptor, access_token: SecretValue) -> Self {
        let source = descriptor.source();
        Self {
            name: descriptor.name().to_string(),
            provider: source.provider,
            owner: source.owner.clone(),
            repository: source.repository.clone(),
            access_token,
            env_vars: descriptor.env_vars().clone(),
            custom_rules: descriptor.custom_rules().to_vec(),
            auto_branch_deletion: descriptor.auto_branch_deletion(),
        }
    }
}

/// Per-branch declaration. Each branch carries its own build spec copy and
/// namespaces so concurrent builds share nothing mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchDeclaration {
    pub branch: String,
    pub build_spec: String,
    pub env_vars: EnvVars,
    pub auto_build: bool,
    pub stage: Stage,
    pub headers: Vec<HeaderRule>,
    pub cache_namespace: String,
    pub artifact_namespace: String,
}

impl BranchDeclaration {
    pub fn from_environment(app_name: &str, environment: &BranchEnvironment) -> Result<Self> {
        Ok(Self {
            branch: environment.name().to_string(),
            build_spec: environment.build_spec().to_yaml()?,
            env_vars: environment.env_vars().clone(),
            auto_build: environment.auto_build(),
            stage: environment.stage(),
            headers: environment.header_rules(),
            cache_namespace: environment.cache_namespace(app_name),
            artifact_namespace: environment.artifact_namespace(app_name),
        })
    }
}

/// Domain association declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainDeclaration {
    pub domain: DomainName,
    pub branch: String,
    pub root_mapping: bool,
    pub zone: HostedZone,
}

impl From<&DomainBinding> for DomainDeclaration {
    fn from(binding: &DomainBinding) -> Self {
        Self {
            domain: binding.domain.clone(),
            branch: binding.target.clone(),
            root_mapping: binding.root_mapping,
            zone: binding.zone.clone(),
        }
    }
}

/// What an upsert did on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Created => write!(f, "created"),
            Change::Updated => write!(f, "updated"),
            Change::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Trait for managed static-site hosting platforms.
///
/// Every mutating call is an upsert keyed by name, so re-applying the same
/// declaration is a no-op.
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    /// Name of this platform.
    fn name(&self) -> &'static str;

    /// Create the application, or update the one with the same name.
    async fn upsert_app(&self, app: &AppDeclaration) -> Result<AppIdentity>;

    /// Branch names currently deployed for an application.
    async fn list_branches(&self, app_id: &str) -> Result<Vec<String>>;

    async fn upsert_branch(&self, app_id: &str, branch: &BranchDeclaration) -> Result<Change>;

    async fn delete_branch(&self, app_id: &str, branch: &str) -> Result<()>;

    /// Associate a domain and request its certificate. Returns immediately
    /// with the current certificate state.
    async fn upsert_domain(
        &self,
        app_id: &str,
        domain: &DomainDeclaration,
    ) -> Result<CertificateStatus>;

    /// Domains currently associated with an application.
    async fn list_domains(&self, app_id: &str) -> Result<Vec<DomainName>>;

    /// Dissociate a domain. Its certificate is released with it.
    async fn delete_domain(&self, app_id: &str, domain: &DomainName) -> Result<()>;

    async fn certificate_status(
        &self,
        app_id: &str,
        domain: &DomainName,
    ) -> Result<CertificateStatus>;
}

/// Trait for DNS providers holding hosted zones.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// The zone `domain` belongs to, if the deployer controls one.
    async fn lookup_zone(&self, domain: &DomainName) -> Result<Option<HostedZone>>;
}

/// Trait for source code hosting providers.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn branch_exists(
        &self,
        repository: &SourceRepository,
        token: &SecretValue,
        branch: &str,
    ) -> Result<bool>;
}
