//! Dry-run deployment against the in-memory platform.

use anyhow::{Context, Result};
use siteplan_config::SiteConfig;
use siteplan_core::secret::SecretStore;
use siteplan_deployer::{
    Deployer, EnvSecretStore, InMemoryPlatform, StaticDnsProvider, StaticSecretStore,
    StaticSourceProvider, reconcile_certificates,
};
use std::sync::Arc;

use crate::Format;
use crate::commands::print_outputs;

/// Apply the descriptor to a simulated platform and show what would happen.
pub async fn run(site: SiteConfig, skip_credentials: bool, format: Format) -> Result<()> {
    let SiteConfig {
        mut descriptor,
        zones,
        ..
    } = site;

    let secrets: Arc<dyn SecretStore> = match (&descriptor.source().credential, skip_credentials)
    {
        (Some(reference), true) => {
            Arc::new(StaticSecretStore::new().with(reference.clone(), "placeholder"))
        }
        _ => Arc::new(EnvSecretStore),
    };
    let platform = Arc::new(InMemoryPlatform::new());
    let deployer = Deployer::new(
        platform.clone(),
        Arc::new(StaticDnsProvider::new(zones)),
        Arc::new(StaticSourceProvider::any()),
        secrets,
    );

    let report = deployer
        .apply(&descriptor)
        .await
        .context("Plan failed")?;
    let updates = reconcile_certificates(platform.as_ref(), &report.identity, &mut descriptor)
        .await
        .context("Certificate reconciliation failed")?;

    match format {
        Format::Json => {
            let plan = serde_json::json!({
                "report": report,
                "certificate_updates": updates,
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Format::Text => {
            println!("Plan for app '{}' (simulated)", descriptor.name());
            for (branch, change) in &report.branches {
                println!("  branch {:<24} {}", branch, change);
            }
            for branch in &report.pruned {
                println!("  branch {:<24} deleted", branch);
            }
            for domain in &report.removed_domains {
                println!("  domain {:<24} removed", domain);
            }
            for binding in descriptor.bindings() {
                println!(
                    "  domain {:<24} -> {} (certificate {})",
                    binding.domain, binding.target, binding.certificate
                );
            }
            println!();
            print_outputs(&report.outputs, format)?;
        }
    }
    Ok(())
}
