//! The application descriptor: the aggregate that owns branch environments
//! and domain bindings.
//!
//! Built through a sequence of validated append operations. Every operation
//! checks all of its preconditions before touching the aggregate, so a
//! failed call leaves the descriptor exactly as it was.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use crate::build_spec::BuildSpecification;
use crate::domain::{CertificateStatus, DomainBinding, DomainName};
use crate::environment::{self, BranchEnvironment, BranchOptions, EnvVars, Stage};
use crate::output::Outputs;
use crate::repository::SourceRepository;
use crate::rule::CustomRule;
use crate::zone::ZoneLookup;
use crate::{Error, Result};

static APP_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,255}$").unwrap());

/// Identity the hosting platform assigns to a registered application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app_id: String,
    /// Platform-generated domain; branches are served at `<branch>.<default_domain>`.
    pub default_domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    name: String,
    source: SourceRepository,
    env_vars: EnvVars,
    auto_branch_deletion: bool,
    custom_rules: Vec<CustomRule>,
    environments: Vec<BranchEnvironment>,
    bindings: Vec<DomainBinding>,
}

impl ApplicationDescriptor {
    /// Declare an application built from `source`.
    pub fn register(name: &str, source: SourceRepository) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Configuration("application name is empty".to_string()));
        }
        if !APP_NAME_REGEX.is_match(name) {
            return Err(Error::Configuration(format!(
                "invalid application name: {:?}",
                name
            )));
        }
        source.validate()?;

        Ok(Self {
            name: name.to_string(),
            source,
            env_vars: EnvVars::new(),
            auto_branch_deletion: false,
            custom_rules: Vec::new(),
            environments: Vec::new(),
            bindings: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SourceRepository {
        &self.source
    }

    /// App-wide environment variables, overridden per branch.
    pub fn env_vars(&self) -> &EnvVars {
        &self.env_vars
    }

    pub fn auto_branch_deletion(&self) -> bool {
        self.auto_branch_deletion
    }

    pub fn custom_rules(&self) -> &[CustomRule] {
        &self.custom_rules
    }

    pub fn environments(&self) -> &[BranchEnvironment] {
        &self.environments
    }

    pub fn bindings(&self) -> &[DomainBinding] {
        &self.bindings
    }

    pub fn environment(&self, branch: &str) -> Option<&BranchEnvironment> {
        self.environments.iter().find(|e| e.name() == branch)
    }

    pub fn binding(&self, domain: &DomainName) -> Option<&DomainBinding> {
        self.bindings.iter().find(|b| &b.domain == domain)
    }

    /// The binding serving `branch`, if any.
    pub fn binding_for(&self, branch: &str) -> Option<&DomainBinding> {
        self.bindings.iter().find(|b| b.target == branch)
    }

    /// Remove platform branches that are no longer declared.
    pub fn set_auto_branch_deletion(&mut self, enabled: bool) {
        self.auto_branch_deletion = enabled;
    }

    pub fn set_env_var(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        environment::validate_env_key(key)?;
        self.env_vars.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn add_custom_rule(&mut self, rule: CustomRule) {
        if !self.custom_rules.contains(&rule) {
            self.custom_rules.push(rule);
        }
    }

    /// Register a branch environment. The stage is inferred from the branch
    /// name; use [`Self::add_branch_environment_with`] to set it explicitly.
    pub fn add_branch_environment(
        &mut self,
        branch: &str,
        build_spec: Arc<BuildSpecification>,
        env_vars: EnvVars,
        auto_build: bool,
    ) -> Result<&BranchEnvironment> {
        let options = BranchOptions::new(build_spec)
            .env_vars(env_vars)
            .auto_build(auto_build)
            .stage(Stage::infer(branch));
        self.add_branch_environment_with(branch, options)
    }

    pub fn add_branch_environment_with(
        &mut self,
        branch: &str,
        options: BranchOptions,
    ) -> Result<&BranchEnvironment> {
        if self.environment(branch).is_some() {
            return Err(Error::DuplicateBranch(branch.to_string()));
        }
        let environment = BranchEnvironment::new(branch, options)?;
        let label = environment.host_label();
        if let Some(other) = self.environments.iter().find(|e| e.host_label() == label) {
            return Err(Error::Configuration(format!(
                "branch '{}' would share the default URL host '{}' with branch '{}'",
                branch,
                label,
                other.name()
            )));
        }
        let index = self.environments.len();
        self.environments.push(environment);
        Ok(&self.environments[index])
    }

    /// Remove a branch environment. Fails while a domain still points at it.
    pub fn remove_branch_environment(&mut self, branch: &str) -> Result<BranchEnvironment> {
        let index = self
            .environments
            .iter()
            .position(|e| e.name() == branch)
            .ok_or_else(|| Error::UnknownTarget(branch.to_string()))?;
        if let Some(binding) = self.binding_for(branch) {
            return Err(Error::Configuration(format!(
                "branch '{}' is still served by domain '{}'",
                branch, binding.domain
            )));
        }
        Ok(self.environments.remove(index))
    }

    /// Bind `domain` to the environment for `target`.
    ///
    /// Re-declaring an identical binding is a no-op that returns the existing
    /// binding with its certificate state intact.
    pub fn add_domain_binding(
        &mut self,
        domain: &str,
        target: &str,
        root_mapping: bool,
        zones: &impl ZoneLookup,
    ) -> Result<&DomainBinding> {
        let domain = DomainName::parse(domain)?;
        let zone = zones
            .resolve(&domain)
            .ok_or_else(|| Error::UnresolvedZone(domain.to_string()))?;
        if self.environment(target).is_none() {
            return Err(Error::UnknownTarget(target.to_string()));
        }

        if let Some(index) = self.bindings.iter().position(|b| b.domain == domain) {
            let existing = &self.bindings[index];
            if existing.target != target {
                return Err(Error::DomainConflict {
                    domain: domain.to_string(),
                    message: format!(
                        "already bound to branch '{}', cannot bind to '{}'",
                        existing.target, target
                    ),
                });
            }
            if existing.root_mapping != root_mapping {
                return Err(Error::DomainConflict {
                    domain: domain.to_string(),
                    message: "root mapping differs from the existing binding; unbind it first"
                        .to_string(),
                });
            }
            return Ok(&self.bindings[index]);
        }

        if let Some(other) = self.binding_for(target) {
            return Err(Error::DomainConflict {
                domain: domain.to_string(),
                message: format!(
                    "branch '{}' is already served by '{}'",
                    target, other.domain
                ),
            });
        }

        let index = self.bindings.len();
        self.bindings
            .push(DomainBinding::new(domain, target, root_mapping, zone));
        Ok(&self.bindings[index])
    }

    /// Remove a binding so the domain can be rebound elsewhere.
    pub fn unbind_domain(&mut self, domain: &DomainName) -> Result<DomainBinding> {
        let index = self
            .bindings
            .iter()
            .position(|b| &b.domain == domain)
            .ok_or_else(|| Error::Configuration(format!("domain '{}' is not bound", domain)))?;
        Ok(self.bindings.remove(index))
    }

    /// Record the platform-reported certificate state for a binding.
    pub fn set_certificate_status(
        &mut self,
        domain: &DomainName,
        status: CertificateStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|b| &b.domain == domain)
            .ok_or_else(|| Error::Configuration(format!("domain '{}' is not bound", domain)))?;
        binding.certificate = status;
        binding.certificate_checked_at = Some(checked_at);
        Ok(())
    }

    /// Describe the resulting URLs. Pure: depends only on `self` and `identity`.
    pub fn emit_outputs(&self, identity: &AppIdentity) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("app.id", &identity.app_id, "Application identifier");
        outputs.insert("app.name", &self.name, "Application name");
        outputs.insert(
            "app.default_domain",
            &identity.default_domain,
            "Platform-generated default domain",
        );

        for environment in &self.environments {
            let branch = environment.name();
            outputs.insert(
                format!("branch.{}.default_url", branch),
                format!(
                    "https://{}.{}",
                    environment.host_label(),
                    identity.default_domain
                ),
                format!("Default platform URL for branch '{}'", branch),
            );
            if let Some(binding) = self.binding_for(branch) {
                outputs.insert(
                    format!("branch.{}.custom_url", branch),
                    binding.custom_url(),
                    format!("Custom domain URL for branch '{}'", branch),
                );
            }
        }

        outputs
    }
}
