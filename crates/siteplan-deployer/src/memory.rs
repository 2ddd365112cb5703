//! In-memory backends used for dry-run planning and tests.

use async_trait::async_trait;
use siteplan_core::secret::{CredentialRef, SecretStore, SecretValue};
use siteplan_core::{
    AppIdentity, CertificateStatus, DomainName, Error, HostedZone, ResourceId, Result,
    SourceRepository, ZoneDirectory, ZoneLookup,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use crate::platform::{
    AppDeclaration, BranchDeclaration, Change, DnsProvider, DomainDeclaration, HostingPlatform,
    SourceProvider,
};

/// Suffix of platform-generated default domains.
pub const DEFAULT_DOMAIN_SUFFIX: &str = "amplifyapp.com";

#[derive(Debug)]
struct AppState {
    identity: AppIdentity,
    declaration: AppDeclaration,
    branches: BTreeMap<String, BranchDeclaration>,
    domains: BTreeMap<DomainName, DomainState>,
}

#[derive(Debug)]
struct DomainState {
    declaration: DomainDeclaration,
    status: CertificateStatus,
}

/// Simulated hosting platform.
///
/// Certificates advance one step (pending, validating, validated) each time
/// their status is polled, unless the domain was marked as failing.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    apps: RwLock<HashMap<String, AppState>>,
    failing_domains: HashSet<DomainName>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make certificate validation for `domain` fail.
    pub fn with_failing_domain(mut self, domain: DomainName) -> Self {
        self.failing_domains.insert(domain);
        self
    }

    /// Number of registered applications.
    pub async fn app_count(&self) -> usize {
        self.apps.read().await.len()
    }

    /// The stored declaration for a branch, if deployed.
    pub async fn branch(&self, app_id: &str, branch: &str) -> Option<BranchDeclaration> {
        let apps = self.apps.read().await;
        apps.values()
            .find(|a| a.identity.app_id == app_id)
            .and_then(|a| a.branches.get(branch).cloned())
    }

    /// The branch a domain currently routes to.
    pub async fn domain_target(&self, app_id: &str, domain: &DomainName) -> Option<String> {
        let apps = self.apps.read().await;
        apps.values()
            .find(|a| a.identity.app_id == app_id)
            .and_then(|a| a.domains.get(domain))
            .map(|d| d.declaration.branch.clone())
    }

    fn app<'a>(apps: &'a HashMap<String, AppState>, app_id: &str) -> Result<&'a AppState> {
        apps.values()
            .find(|a| a.identity.app_id == app_id)
            .ok_or_else(|| Error::Platform(format!("unknown app id {}", app_id)))
    }

    fn app_mut<'a>(
        apps: &'a mut HashMap<String, AppState>,
        app_id: &str,
    ) -> Result<&'a mut AppState> {
        apps.values_mut()
            .find(|a| a.identity.app_id == app_id)
            .ok_or_else(|| Error::Platform(format!("unknown app id {}", app_id)))
    }
}

#[async_trait]
impl HostingPlatform for InMemoryPlatform {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn upsert_app(&self, app: &AppDeclaration) -> Result<AppIdentity> {
        let mut apps = self.apps.write().await;
        if let Some(state) = apps.get_mut(&app.name) {
            state.declaration = app.clone();
            return Ok(state.identity.clone());
        }

        let app_id = ResourceId::new().short();
        let identity = AppIdentity {
            default_domain: format!("{}.{}", app_id, DEFAULT_DOMAIN_SUFFIX),
            app_id,
        };
        debug!(app = %app.name, app_id = %identity.app_id, "registered app");
        apps.insert(
            app.name.clone(),
            AppState {
                identity: identity.clone(),
                declaration: app.clone(),
                branches: BTreeMap::new(),
                domains: BTreeMap::new(),
            },
        );
        Ok(identity)
    }

    async fn list_branches(&self, app_id: &str) -> Result<Vec<String>> {
        let apps = self.apps.read().await;
        let state = Self::app(&apps, app_id)?;
        Ok(state.branches.keys().cloned().collect())
    }

    async fn upsert_branch(&self, app_id: &str, branch: &BranchDeclaration) -> Result<Change> {
        let mut apps = self.apps.write().await;
        let state = Self::app_mut(&mut apps, app_id)?;
        let change = match state.branches.get(&branch.branch) {
            None => Change::Created,
            Some(existing) if existing == branch => Change::Unchanged,
            Some(_) => Change::Updated,
        };
        state.branches.insert(branch.branch.clone(), branch.clone());
        Ok(change)
    }

    async fn delete_branch(&self, app_id: &str, branch: &str) -> Result<()> {
        let mut apps = self.apps.write().await;
        let state = Self::app_mut(&mut apps, app_id)?;
        if let Some(domain) = state
            .domains
            .values()
            .find(|d| d.declaration.branch == branch)
        {
            return Err(Error::Platform(format!(
                "branch {} still serves domain {}",
                branch, domain.declaration.domain
            )));
        }
        state
            .branches
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| Error::Platform(format!("branch {} does not exist", branch)))
    }

    async fn upsert_domain(
        &self,
        app_id: &str,
        domain: &DomainDeclaration,
    ) -> Result<CertificateStatus> {
        let mut apps = self.apps.write().await;
        let state = Self::app_mut(&mut apps, app_id)?;
        if !state.branches.contains_key(&domain.branch) {
            return Err(Error::Platform(format!(
                "branch {} is not deployed",
                domain.branch
            )));
        }

        match state.domains.get_mut(&domain.domain) {
            Some(existing) if existing.declaration == *domain => Ok(existing.status.clone()),
            Some(existing) => {
                existing.declaration = domain.clone();
                Ok(existing.status.clone())
            }
            None => {
                state.domains.insert(
                    domain.domain.clone(),
                    DomainState {
                        declaration: domain.clone(),
                        status: CertificateStatus::Pending,
                    },
                );
                Ok(CertificateStatus::Pending)
            }
        }
    }

    async fn list_domains(&self, app_id: &str) -> Result<Vec<DomainName>> {
        let apps = self.apps.read().await;
        let state = Self::app(&apps, app_id)?;
        Ok(state.domains.keys().cloned().collect())
    }

    async fn delete_domain(&self, app_id: &str, domain: &DomainName) -> Result<()> {
        let mut apps = self.apps.write().await;
        let state = Self::app_mut(&mut apps, app_id)?;
        state
            .domains
            .remove(domain)
            .map(|_| ())
            .ok_or_else(|| Error::Platform(format!("domain {} is not associated", domain)))
    }

    async fn certificate_status(
        &self,
        app_id: &str,
        domain: &DomainName,
    ) -> Result<CertificateStatus> {
        let mut apps = self.apps.write().await;
        let state = Self::app_mut(&mut apps, app_id)?;
        let entry = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| Error::Platform(format!("domain {} is not associated", domain)))?;

        let failing = self.failing_domains.contains(domain);
        entry.status = match (&entry.status, failing) {
            (CertificateStatus::Pending, _) => CertificateStatus::Validating,
            (CertificateStatus::Validating, false) => CertificateStatus::Validated,
            (CertificateStatus::Validating, true) => CertificateStatus::Failed {
                reason: "validation record not found".to_string(),
            },
            (terminal, _) => terminal.clone(),
        };
        Ok(entry.status.clone())
    }
}

/// DNS provider answering from a fixed zone directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDnsProvider {
    zones: ZoneDirectory,
}

impl StaticDnsProvider {
    pub fn new(zones: ZoneDirectory) -> Self {
        Self { zones }
    }
}

#[async_trait]
impl DnsProvider for StaticDnsProvider {
    async fn lookup_zone(&self, domain: &DomainName) -> Result<Option<HostedZone>> {
        Ok(self.zones.resolve(domain))
    }
}

/// Source provider with a fixed branch list. `None` accepts every branch.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceProvider {
    branches: Option<HashSet<String>>,
}

impl StaticSourceProvider {
    /// Accept any branch name.
    pub fn any() -> Self {
        Self { branches: None }
    }

    pub fn with_branches<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: Some(branches.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl SourceProvider for StaticSourceProvider {
    async fn branch_exists(
        &self,
        _repository: &SourceRepository,
        _token: &SecretValue,
        branch: &str,
    ) -> Result<bool> {
        Ok(self
            .branches
            .as_ref()
            .is_none_or(|branches| branches.contains(branch)))
    }
}

/// Secret store holding fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    values: HashMap<CredentialRef, SecretValue>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: CredentialRef, value: impl Into<String>) -> Self {
        self.values.insert(reference, SecretValue::new(value));
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get(&self, reference: &CredentialRef) -> Result<SecretValue> {
        self.values
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::Secret(format!("no value for {}", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteplan_core::environment::Stage;

    fn app_decl(name: &str) -> AppDeclaration {
        AppDeclaration {
            name: name.to_string(),
            provider: Default::default(),
            owner: "acme".to_string(),
            repository: "site".to_string(),
            access_token: SecretValue::new("token"),
            env_vars: Default::default(),
            custom_rules: vec![],
            auto_branch_deletion: false,
        }
    }

    fn branch_decl(name: &str) -> BranchDeclaration {
        BranchDeclaration {
            branch: name.to_string(),
            build_spec: "version: '1.0'\n".to_string(),
            env_vars: Default::default(),
            auto_build: true,
            stage: Stage::Development,
            headers: vec![],
            cache_namespace: format!("site/{}/cache", name),
            artifact_namespace: format!("site/{}/artifacts", name),
        }
    }

    fn domain_decl(domain: &str, branch: &str) -> DomainDeclaration {
        let domain = DomainName::parse(domain).unwrap();
        DomainDeclaration {
            zone: HostedZone::new(domain.clone()),
            domain,
            branch: branch.to_string(),
            root_mapping: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_app_by_name() {
        let platform = InMemoryPlatform::new();
        let first = platform.upsert_app(&app_decl("site")).await.unwrap();
        let second = platform.upsert_app(&app_decl("site")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(platform.app_count().await, 1);
        assert!(first.default_domain.ends_with(".amplifyapp.com"));

        let other = platform.upsert_app(&app_decl("docs")).await.unwrap();
        assert_ne!(first.app_id, other.app_id);
    }

    #[tokio::test]
    async fn test_branch_changes() {
        let platform = InMemoryPlatform::new();
        let id = platform.upsert_app(&app_decl("site")).await.unwrap().app_id;

        let main = branch_decl("main");
        assert_eq!(platform.upsert_branch(&id, &main).await.unwrap(), Change::Created);
        assert_eq!(platform.upsert_branch(&id, &main).await.unwrap(), Change::Unchanged);

        let mut changed = main.clone();
        changed.auto_build = false;
        assert_eq!(platform.upsert_branch(&id, &changed).await.unwrap(), Change::Updated);

        platform.delete_branch(&id, "main").await.unwrap();
        assert!(platform.list_branches(&id).await.unwrap().is_empty());
        assert!(platform.delete_branch(&id, "main").await.is_err());
    }

    #[tokio::test]
    async fn test_certificate_progression() {
        let platform = InMemoryPlatform::new();
        let id = platform.upsert_app(&app_decl("site")).await.unwrap().app_id;
        platform.upsert_branch(&id, &branch_decl("prod")).await.unwrap();

        let decl = domain_decl("trakkyfood.it", "prod");
        assert_eq!(
            platform.upsert_domain(&id, &decl).await.unwrap(),
            CertificateStatus::Pending
        );
        let status = platform.certificate_status(&id, &decl.domain).await.unwrap();
        assert_eq!(status, CertificateStatus::Validating);
        let status = platform.certificate_status(&id, &decl.domain).await.unwrap();
        assert_eq!(status, CertificateStatus::Validated);

        // Re-declaring keeps the validated certificate.
        assert_eq!(
            platform.upsert_domain(&id, &decl).await.unwrap(),
            CertificateStatus::Validated
        );
    }

    #[tokio::test]
    async fn test_failing_certificate() {
        let domain = DomainName::parse("trakkyfood.it").unwrap();
        let platform = InMemoryPlatform::new().with_failing_domain(domain.clone());
        let id = platform.upsert_app(&app_decl("site")).await.unwrap().app_id;
        platform.upsert_branch(&id, &branch_decl("prod")).await.unwrap();
        platform
            .upsert_domain(&id, &domain_decl("trakkyfood.it", "prod"))
            .await
            .unwrap();

        platform.certificate_status(&id, &domain).await.unwrap();
        let status = platform.certificate_status(&id, &domain).await.unwrap();
        assert!(matches!(status, CertificateStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_domain_requires_deployed_branch() {
        let platform = InMemoryPlatform::new();
        let id = platform.upsert_app(&app_decl("site")).await.unwrap().app_id;
        let result = platform
            .upsert_domain(&id, &domain_decl("trakkyfood.it", "prod"))
            .await;
        assert!(matches!(result, Err(Error::Platform(_))));
    }

    #[tokio::test]
    async fn test_domain_removal_frees_branch() {
        let platform = InMemoryPlatform::new();
        let id = platform.upsert_app(&app_decl("site")).await.unwrap().app_id;
        platform.upsert_branch(&id, &branch_decl("main")).await.unwrap();
        let decl = domain_decl("dev.trakkyfood.it", "main");
        platform.upsert_domain(&id, &decl).await.unwrap();

        assert!(matches!(
            platform.delete_branch(&id, "main").await,
            Err(Error::Platform(_))
        ));
        assert_eq!(platform.list_domains(&id).await.unwrap(), vec![decl.domain.clone()]);

        platform.delete_domain(&id, &decl.domain).await.unwrap();
        assert!(platform.list_domains(&id).await.unwrap().is_empty());
        assert!(platform.delete_domain(&id, &decl.domain).await.is_err());
        platform.delete_branch(&id, "main").await.unwrap();
    }

    #[tokio::test]
    async fn test_static_source_provider() {
        let repo = SourceRepository::github("acme", "site", CredentialRef::Env("T".into()));
        let token = SecretValue::new("t");
        let provider = StaticSourceProvider::with_branches(["main"]);
        assert!(provider.branch_exists(&repo, &token, "main").await.unwrap());
        assert!(!provider.branch_exists(&repo, &token, "prod").await.unwrap());
        assert!(
            StaticSourceProvider::any()
                .branch_exists(&repo, &token, "prod")
                .await
                .unwrap()
        );
    }
}
