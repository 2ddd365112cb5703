//! CLI command implementations.

pub mod plan;

use anyhow::{Context, Result, bail};
use siteplan_config::{SiteConfig, VariableContext, load_site};
use siteplan_core::{AppIdentity, Outputs};
use tracing::debug;

use crate::Format;

/// Load the site configuration with process env and `--var` values.
pub fn load(path: &str, vars: &[(String, String)]) -> Result<SiteConfig> {
    let mut ctx = VariableContext::from_process_env();
    for (name, value) in vars {
        ctx.set(name, value.clone());
    }
    debug!(config = %path, vars = vars.len(), "loading site configuration");
    load_site(path, &ctx).with_context(|| format!("Failed to load site config: {}", path))
}

pub fn validate(site: &SiteConfig, format: Format) -> Result<()> {
    let app = &site.descriptor;
    match format {
        Format::Json => {
            let summary = serde_json::json!({
                "valid": true,
                "app": app.name(),
                "branches": app.environments().iter().map(|e| e.name()).collect::<Vec<_>>(),
                "domains": app.bindings().iter().map(|b| b.domain.as_str()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Format::Text => {
            println!("Configuration is valid");
            println!("  app:      {} ({})", app.name(), app.source().full_name());
            for env in app.environments() {
                println!(
                    "  branch:   {} [stage {}, {}, auto-build {}]",
                    env.name(),
                    env.stage(),
                    env.indexing(),
                    env.auto_build()
                );
            }
            for binding in app.bindings() {
                let mapping = if binding.root_mapping { "root" } else { "subdomain" };
                println!(
                    "  domain:   {} -> {} ({})",
                    binding.domain, binding.target, mapping
                );
            }
        }
    }
    Ok(())
}

pub fn buildspec(site: &SiteConfig, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let spec = site
                .build_specs
                .get(name)
                .with_context(|| format!("No build-spec named '{}'", name))?;
            print!("{}", spec.to_yaml()?);
        }
        None => {
            if site.build_specs.is_empty() {
                bail!("Configuration defines no build-spec");
            }
            for (name, spec) in &site.build_specs {
                println!("# {}", name);
                print!("{}", spec.to_yaml()?);
            }
        }
    }
    Ok(())
}

pub fn outputs(
    site: &SiteConfig,
    app_id: String,
    default_domain: String,
    format: Format,
) -> Result<()> {
    let identity = AppIdentity {
        app_id,
        default_domain,
    };
    print_outputs(&site.descriptor.emit_outputs(&identity), format)
}

pub(crate) fn print_outputs(outputs: &Outputs, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&outputs.to_map())?),
        Format::Text => {
            for (name, output) in outputs.iter() {
                println!("{:<32} {}", name, output.value);
            }
        }
    }
    Ok(())
}
