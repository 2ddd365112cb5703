//! Applying a descriptor to a hosting platform.

use futures::future::try_join_all;
use serde::Serialize;
use siteplan_core::secret::SecretStore;
use siteplan_core::{
    AppIdentity, ApplicationDescriptor, CertificateStatus, DomainName, Error, Outputs, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::platform::{
    AppDeclaration, BranchDeclaration, Change, DnsProvider, DomainDeclaration, HostingPlatform,
    SourceProvider,
};

/// What an apply did.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub identity: AppIdentity,
    pub branches: BTreeMap<String, Change>,
    /// Platform branches removed because they are no longer declared.
    pub pruned: Vec<String>,
    /// Platform domains removed because no binding declares them anymore.
    pub removed_domains: Vec<DomainName>,
    /// Declared branches the source repository does not have yet.
    pub missing_branches: Vec<String>,
    /// Certificate state reported when each domain was declared.
    pub certificates: BTreeMap<DomainName, CertificateStatus>,
    pub outputs: Outputs,
}

impl ApplyReport {
    /// True if nothing on the platform changed.
    pub fn is_noop(&self) -> bool {
        self.pruned.is_empty()
            && self.removed_domains.is_empty()
            && self.branches.values().all(|c| *c == Change::Unchanged)
    }
}

/// Applies descriptors through the external collaborators.
pub struct Deployer {
    platform: Arc<dyn HostingPlatform>,
    dns: Arc<dyn DnsProvider>,
    source: Arc<dyn SourceProvider>,
    secrets: Arc<dyn SecretStore>,
}

impl Deployer {
    pub fn new(
        platform: Arc<dyn HostingPlatform>,
        dns: Arc<dyn DnsProvider>,
        source: Arc<dyn SourceProvider>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            platform,
            dns,
            source,
            secrets,
        }
    }

    pub fn platform(&self) -> &Arc<dyn HostingPlatform> {
        &self.platform
    }

    /// Apply `descriptor`.
    ///
    /// Everything that can fail locally (credential, zones, build spec
    /// serialization) is checked before the first platform mutation.
    /// Certificate issuance is requested but never awaited.
    pub async fn apply(&self, descriptor: &ApplicationDescriptor) -> Result<ApplyReport> {
        let source = descriptor.source();
        let credential = source.credential.as_ref().ok_or_else(|| {
            Error::Configuration(format!(
                "source repository '{}' has no access credential",
                source.full_name()
            ))
        })?;
        let token = self.secrets.get(credential).await?;
        if token.is_empty() {
            return Err(Error::Secret(format!("credential {} is empty", credential)));
        }

        for binding in descriptor.bindings() {
            match self.dns.lookup_zone(&binding.domain).await? {
                Some(zone) if zone.name == binding.zone.name => {}
                _ => return Err(Error::UnresolvedZone(binding.domain.to_string())),
            }
        }

        let mut missing_branches = Vec::new();
        for environment in descriptor.environments() {
            if !self
                .source
                .branch_exists(source, &token, environment.name())
                .await?
            {
                warn!(
                    branch = environment.name(),
                    repository = %source.full_name(),
                    "branch not found in source repository; it will build once pushed"
                );
                missing_branches.push(environment.name().to_string());
            }
        }

        let branch_decls = descriptor
            .environments()
            .iter()
            .map(|env| BranchDeclaration::from_environment(descriptor.name(), env))
            .collect::<Result<Vec<_>>>()?;
        let domain_decls: Vec<DomainDeclaration> =
            descriptor.bindings().iter().map(DomainDeclaration::from).collect();
        let app_decl = AppDeclaration::from_descriptor(descriptor, token);

        // Validation done; mutations start here.
        let identity = self.platform.upsert_app(&app_decl).await?;
        info!(
            app = descriptor.name(),
            app_id = %identity.app_id,
            platform = self.platform.name(),
            "app registered"
        );

        let changes = try_join_all(
            branch_decls
                .iter()
                .map(|decl| self.platform.upsert_branch(&identity.app_id, decl)),
        )
        .await?;
        let mut branches = BTreeMap::new();
        for (decl, change) in branch_decls.iter().zip(changes) {
            match change {
                Change::Unchanged => debug!(branch = %decl.branch, "branch unchanged"),
                _ => info!(branch = %decl.branch, %change, "branch applied"),
            }
            branches.insert(decl.branch.clone(), change);
        }

        // Domains go before branches so no association outlives its branch.
        let mut removed_domains = Vec::new();
        for existing in self.platform.list_domains(&identity.app_id).await? {
            if descriptor.binding(&existing).is_none() {
                self.platform
                    .delete_domain(&identity.app_id, &existing)
                    .await?;
                info!(domain = %existing, "unbound domain removed");
                removed_domains.push(existing);
            }
        }

        let mut pruned = Vec::new();
        if descriptor.auto_branch_deletion() {
            for existing in self.platform.list_branches(&identity.app_id).await? {
                if descriptor.environment(&existing).is_none() {
                    self.platform
                        .delete_branch(&identity.app_id, &existing)
                        .await?;
                    info!(branch = %existing, "orphaned branch deleted");
                    pruned.push(existing);
                }
            }
        }

        let mut certificates = BTreeMap::new();
        for decl in &domain_decls {
            let status = self.platform.upsert_domain(&identity.app_id, decl).await?;
            info!(
                domain = %decl.domain,
                branch = %decl.branch,
                root = decl.root_mapping,
                certificate = %status,
                "domain associated"
            );
            certificates.insert(decl.domain.clone(), status);
        }

        let outputs = descriptor.emit_outputs(&identity);
        Ok(ApplyReport {
            identity,
            branches,
            pruned,
            removed_domains,
            missing_branches,
            certificates,
            outputs,
        })
    }
}
