//! Certificate reconciliation.
//!
//! Certificate issuance finishes on the platform's schedule. Reconciling
//! polls each unfinished binding once and records what the platform
//! reports; it never waits for validation to complete.

use chrono::Utc;
use serde::Serialize;
use siteplan_core::{AppIdentity, ApplicationDescriptor, CertificateStatus, DomainName, Result};
use tracing::{info, warn};

use crate::platform::HostingPlatform;

/// A certificate state transition observed during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateUpdate {
    pub domain: DomainName,
    pub previous: CertificateStatus,
    pub current: CertificateStatus,
}

/// Refresh the certificate state of every binding that is not yet validated
/// or failed. Returns the bindings whose state changed.
///
/// A binding whose status query fails is logged and left untouched for the
/// next round; the remaining bindings are still polled.
pub async fn reconcile_certificates(
    platform: &dyn HostingPlatform,
    identity: &AppIdentity,
    descriptor: &mut ApplicationDescriptor,
) -> Result<Vec<CertificateUpdate>> {
    let pending: Vec<(DomainName, CertificateStatus)> = descriptor
        .bindings()
        .iter()
        .filter(|b| !b.certificate.is_terminal())
        .map(|b| (b.domain.clone(), b.certificate.clone()))
        .collect();

    let mut updates = Vec::new();
    for (domain, previous) in pending {
        let current = match platform
            .certificate_status(&identity.app_id, &domain)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(domain = %domain, error = %e, "certificate status query failed");
                continue;
            }
        };
        descriptor.set_certificate_status(&domain, current.clone(), Utc::now())?;

        if current == previous {
            continue;
        }
        match &current {
            CertificateStatus::Failed { reason } => {
                warn!(domain = %domain, reason = %reason, "certificate validation failed")
            }
            status => info!(domain = %domain, certificate = %status, "certificate state changed"),
        }
        updates.push(CertificateUpdate {
            domain,
            previous,
            current,
        });
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::Deployer;
    use crate::memory::{
        InMemoryPlatform, StaticDnsProvider, StaticSecretStore, StaticSourceProvider,
    };
    use siteplan_core::environment::EnvVars;
    use siteplan_core::secret::CredentialRef;
    use siteplan_core::{BuildSpecification, HostedZone, SourceRepository, ZoneDirectory};
    use std::sync::Arc;

    fn setup(platform: Arc<InMemoryPlatform>) -> (Deployer, ApplicationDescriptor) {
        let token = CredentialRef::Env("GITHUB_TOKEN".to_string());
        let zones = ZoneDirectory::new()
            .with_zone(HostedZone::new(DomainName::parse("trakkyfood.it").unwrap()));
        let mut app = ApplicationDescriptor::register(
            "site",
            SourceRepository::github("acme", "site", token.clone()),
        )
        .unwrap();
        let spec = Arc::new(
            BuildSpecification::define(
                vec![],
                vec!["npm run build".to_string()],
                "dist",
                vec![],
                vec![],
            )
            .unwrap(),
        );
        app.add_branch_environment("prod", spec, EnvVars::new(), true)
            .unwrap();
        app.add_domain_binding("trakkyfood.it", "prod", true, &zones)
            .unwrap();

        let deployer = Deployer::new(
            platform,
            Arc::new(StaticDnsProvider::new(zones)),
            Arc::new(StaticSourceProvider::any()),
            Arc::new(StaticSecretStore::new().with(token, "ghp_test")),
        );
        (deployer, app)
    }

    #[tokio::test]
    async fn test_reconcile_until_validated() {
        let platform = Arc::new(InMemoryPlatform::new());
        let (deployer, mut app) = setup(platform.clone());
        let report = deployer.apply(&app).await.unwrap();
        let domain = DomainName::parse("trakkyfood.it").unwrap();

        let updates = reconcile_certificates(platform.as_ref(), &report.identity, &mut app)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].current, CertificateStatus::Validating);

        reconcile_certificates(platform.as_ref(), &report.identity, &mut app)
            .await
            .unwrap();
        let binding = app.binding(&domain).unwrap();
        assert_eq!(binding.certificate, CertificateStatus::Validated);
        assert!(binding.certificate_checked_at.is_some());

        // Validated bindings are not polled again.
        let updates = reconcile_certificates(platform.as_ref(), &report.identity, &mut app)
            .await
            .unwrap();
        assert!(updates.is_empty());

        // Re-applying after validation keeps the binding validated.
        let report = deployer.apply(&app).await.unwrap();
        assert_eq!(report.certificates[&domain], CertificateStatus::Validated);
    }

    #[tokio::test]
    async fn test_reconcile_skips_unqueryable_binding() {
        let platform = Arc::new(InMemoryPlatform::new());
        let (deployer, mut app) = setup(platform.clone());
        let report = deployer.apply(&app).await.unwrap();

        // Declared locally but never applied, so the platform has no record.
        let zones = ZoneDirectory::new()
            .with_zone(HostedZone::new(DomainName::parse("trakkyfood.it").unwrap()));
        let spec = app.environment("prod").unwrap().build_spec().clone();
        app.add_branch_environment("main", spec, EnvVars::new(), true)
            .unwrap();
        app.add_domain_binding("dev.trakkyfood.it", "main", true, &zones)
            .unwrap();

        let updates = reconcile_certificates(platform.as_ref(), &report.identity, &mut app)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].domain, DomainName::parse("trakkyfood.it").unwrap());

        let dev = app
            .binding(&DomainName::parse("dev.trakkyfood.it").unwrap())
            .unwrap();
        assert_eq!(dev.certificate, CertificateStatus::Pending);
        assert!(dev.certificate_checked_at.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_records_failure() {
        let domain = DomainName::parse("trakkyfood.it").unwrap();
        let platform = Arc::new(InMemoryPlatform::new().with_failing_domain(domain.clone()));
        let (deployer, mut app) = setup(platform.clone());
        let report = deployer.apply(&app).await.unwrap();

        for _ in 0..2 {
            reconcile_certificates(platform.as_ref(), &report.identity, &mut app)
                .await
                .unwrap();
        }
        assert!(matches!(
            app.binding(&domain).unwrap().certificate,
            CertificateStatus::Failed { .. }
        ));
    }
}
