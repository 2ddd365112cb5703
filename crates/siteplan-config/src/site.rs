//! Site descriptor parsing.
//!
//! A `siteplan.kdl` file declares one application, the hosted zones the
//! deployer controls, shared build specs, branches, domains and rules.
//! Node order does not matter; branches and domains are registered in the
//! order they appear.

use crate::{ConfigError, ConfigResult, VariableContext};
use kdl::{KdlDocument, KdlNode};
use siteplan_core::environment::{BranchOptions, EnvVars, IndexingPolicy, Stage};
use siteplan_core::secret::CredentialRef;
use siteplan_core::{
    ApplicationDescriptor, BuildSpecification, CustomRule, DomainName, GitProvider, HostedZone,
    RedirectStatus, SourceRepository, ZoneDirectory,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A parsed and validated site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub descriptor: ApplicationDescriptor,
    /// Zones declared with `hosted-zone`; domains must resolve in one of them.
    pub zones: ZoneDirectory,
    pub build_specs: BTreeMap<String, Arc<BuildSpecification>>,
}

/// Read and parse a site configuration file.
pub fn load_site(path: impl AsRef<Path>, vars: &VariableContext) -> ConfigResult<SiteConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "loaded site configuration");
    parse_site(&content, vars)
}

struct AppDecl {
    name: String,
    auto_branch_deletion: bool,
    source: Option<SourceRepository>,
    env: EnvVars,
}

struct BranchDecl {
    name: String,
    build_spec: Option<String>,
    auto_build: bool,
    stage: Option<Stage>,
    indexing: Option<IndexingPolicy>,
    env: EnvVars,
}

struct DomainDecl {
    domain: String,
    target: String,
    root: bool,
}

/// Parse a site configuration from KDL text.
pub fn parse_site(kdl: &str, vars: &VariableContext) -> ConfigResult<SiteConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut vars = vars.clone();
    for node in doc.nodes().iter().filter(|n| n.name().value() == "vars") {
        let declared = Reader::new(&vars).string_map(node, "vars")?;
        for (key, value) in declared {
            vars.set(&key, value);
        }
    }
    let reader = Reader::new(&vars);

    let mut app: Option<AppDecl> = None;
    let mut zones = ZoneDirectory::new();
    let mut build_specs = BTreeMap::new();
    let mut branches = Vec::new();
    let mut domains = Vec::new();
    let mut rules = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "app" => {
                if app.is_some() {
                    return Err(ConfigError::Duplicate("app".to_string()));
                }
                app = Some(reader.app(node)?);
            }
            "hosted-zone" => {
                let name = reader.required_arg(node, "hosted-zone name")?;
                let mut zone = HostedZone::new(DomainName::parse(&name)?);
                if let Some(id) = reader.prop(node, "id")? {
                    zone = zone.with_id(id);
                }
                zones.insert(zone);
            }
            "build-spec" => {
                let name = reader.required_arg(node, "build-spec name")?;
                if build_specs.contains_key(&name) {
                    return Err(ConfigError::Duplicate(format!("build-spec '{}'", name)));
                }
                let spec = reader.build_spec(node)?;
                build_specs.insert(name, Arc::new(spec));
            }
            "branch" => branches.push(reader.branch(node)?),
            "domain" => domains.push(DomainDecl {
                domain: reader.required_arg(node, "domain name")?,
                target: reader
                    .prop(node, "target")?
                    .ok_or_else(|| ConfigError::MissingField("domain target".to_string()))?,
                root: get_bool_prop(node, "root").unwrap_or(false),
            }),
            "rule" => {
                let source = reader.required_arg(node, "rule source")?;
                let target = reader
                    .prop(node, "target")?
                    .ok_or_else(|| ConfigError::MissingField("rule target".to_string()))?;
                let status = match reader.prop(node, "status")? {
                    Some(status) => status.parse::<RedirectStatus>()?,
                    None => RedirectStatus::Rewrite,
                };
                rules.push(CustomRule::new(source, target, status)?);
            }
            "vars" => {}
            other => warn!(node = other, "ignoring unknown configuration node"),
        }
    }

    let app = app.ok_or_else(|| ConfigError::MissingField("app".to_string()))?;
    let source = app
        .source
        .ok_or_else(|| ConfigError::MissingField("app source".to_string()))?;

    let mut descriptor = ApplicationDescriptor::register(&app.name, source)?;
    descriptor.set_auto_branch_deletion(app.auto_branch_deletion);
    for (key, value) in app.env {
        descriptor.set_env_var(&key, value)?;
    }

    for branch in branches {
        let spec = resolve_build_spec(&build_specs, &branch)?;
        let stage = branch.stage.unwrap_or_else(|| Stage::infer(&branch.name));
        let mut options = BranchOptions::new(spec)
            .env_vars(branch.env)
            .auto_build(branch.auto_build)
            .stage(stage);
        if let Some(indexing) = branch.indexing {
            options = options.indexing(indexing);
        }
        descriptor.add_branch_environment_with(&branch.name, options)?;
    }

    for domain in domains {
        descriptor.add_domain_binding(&domain.domain, &domain.target, domain.root, &zones)?;
    }

    for rule in rules {
        descriptor.add_custom_rule(rule);
    }

    Ok(SiteConfig {
        descriptor,
        zones,
        build_specs,
    })
}

fn resolve_build_spec(
    specs: &BTreeMap<String, Arc<BuildSpecification>>,
    branch: &BranchDecl,
) -> ConfigResult<Arc<BuildSpecification>> {
    match &branch.build_spec {
        Some(name) => specs.get(name).cloned().ok_or_else(|| {
            ConfigError::InvalidReference(format!(
                "branch '{}' uses unknown build-spec '{}'",
                branch.name, name
            ))
        }),
        // A single spec is the implicit default.
        None => {
            let mut all = specs.values();
            match (all.next(), all.next()) {
                (Some(only), None) => Ok(only.clone()),
                _ => Err(ConfigError::MissingField(format!(
                    "build-spec for branch '{}'",
                    branch.name
                ))),
            }
        }
    }
}

/// Reads interpolated values out of KDL nodes.
struct Reader<'a> {
    vars: &'a VariableContext,
}

impl<'a> Reader<'a> {
    fn new(vars: &'a VariableContext) -> Self {
        Self { vars }
    }

    fn expand(&self, field: &str, raw: &str) -> ConfigResult<String> {
        let value = self.vars.interpolate(raw);
        let missing = self.vars.unresolved(&value);
        if !missing.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: format!("unresolved variables: {}", missing.join(", ")),
            });
        }
        Ok(value)
    }

    fn arg(&self, node: &KdlNode, field: &str) -> ConfigResult<Option<String>> {
        get_first_string_arg(node)
            .map(|raw| self.expand(field, &raw))
            .transpose()
    }

    fn required_arg(&self, node: &KdlNode, field: &str) -> ConfigResult<String> {
        self.arg(node, field)?
            .ok_or_else(|| ConfigError::MissingField(field.to_string()))
    }

    fn args(&self, node: &KdlNode, field: &str) -> ConfigResult<Vec<String>> {
        get_all_string_args(node)
            .iter()
            .map(|raw| self.expand(field, raw))
            .collect()
    }

    fn prop(&self, node: &KdlNode, name: &str) -> ConfigResult<Option<String>> {
        get_string_prop(node, name)
            .map(|raw| self.expand(name, &raw))
            .transpose()
    }

    fn string_map(&self, node: &KdlNode, field: &str) -> ConfigResult<EnvVars> {
        let mut map = EnvVars::new();
        if let Some(children) = node.children() {
            for child in children.nodes() {
                let key = child.name().value().to_string();
                let value = self
                    .arg(child, field)?
                    .ok_or_else(|| ConfigError::MissingField(format!("{} value for {}", field, key)))?;
                if map.insert(key.clone(), value).is_some() {
                    return Err(ConfigError::Duplicate(format!("{} key '{}'", field, key)));
                }
            }
        }
        Ok(map)
    }

    fn app(&self, node: &KdlNode) -> ConfigResult<AppDecl> {
        let name = self.required_arg(node, "app name")?;
        let auto_branch_deletion = get_bool_prop(node, "auto-branch-deletion").unwrap_or(false);

        let mut source = None;
        let mut env = EnvVars::new();
        if let Some(children) = node.children() {
            for child in children.nodes() {
                match child.name().value() {
                    "source" => source = Some(self.source(child)?),
                    "env" => env = self.string_map(child, "env")?,
                    other => warn!(node = other, "ignoring unknown app setting"),
                }
            }
        }

        Ok(AppDecl {
            name,
            auto_branch_deletion,
            source,
            env,
        })
    }

    fn source(&self, node: &KdlNode) -> ConfigResult<SourceRepository> {
        let provider = match self.arg(node, "source provider")? {
            Some(provider) => provider.parse::<GitProvider>()?,
            None => GitProvider::default(),
        };
        let credential = self
            .prop(node, "credential")?
            .map(|c| c.parse::<CredentialRef>())
            .transpose()?;

        Ok(SourceRepository {
            provider,
            owner: self.prop(node, "owner")?.unwrap_or_default(),
            repository: self.prop(node, "repository")?.unwrap_or_default(),
            credential,
        })
    }

    fn build_spec(&self, node: &KdlNode) -> ConfigResult<BuildSpecification> {
        let mut install = Vec::new();
        let mut build = Vec::new();
        let mut artifact_dir = String::new();
        let mut files = Vec::new();
        let mut cache = Vec::new();

        if let Some(children) = node.children() {
            for child in children.nodes() {
                match child.name().value() {
                    "install" => install.extend(self.args(child, "install")?),
                    "build" => build.extend(self.args(child, "build")?),
                    "artifacts" => {
                        artifact_dir = self.arg(child, "artifacts")?.unwrap_or_default();
                        if let Some(grandchildren) = child.children() {
                            for gc in grandchildren.nodes() {
                                if gc.name().value() == "files" {
                                    files.extend(self.args(gc, "files")?);
                                }
                            }
                        }
                    }
                    "cache" => cache.extend(self.args(child, "cache")?),
                    other => warn!(node = other, "ignoring unknown build-spec step"),
                }
            }
        }

        Ok(BuildSpecification::define(
            install,
            build,
            artifact_dir,
            files,
            cache,
        )?)
    }

    fn branch(&self, node: &KdlNode) -> ConfigResult<BranchDecl> {
        let name = self.required_arg(node, "branch name")?;
        let stage = self
            .prop(node, "stage")?
            .map(|s| s.parse::<Stage>())
            .transpose()?;
        let indexing = match self.prop(node, "indexing")?.as_deref() {
            None => None,
            Some("indexable") => Some(IndexingPolicy::Indexable),
            Some("noindex") => Some(IndexingPolicy::NoIndex),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "indexing".to_string(),
                    message: format!("expected indexable or noindex, got {}", other),
                });
            }
        };

        let mut env = EnvVars::new();
        if let Some(children) = node.children() {
            for child in children.nodes() {
                if child.name().value() == "env" {
                    env = self.string_map(child, "env")?;
                }
            }
        }

        Ok(BranchDecl {
            name,
            build_spec: self.prop(node, "build-spec")?,
            auto_build: get_bool_prop(node, "auto-build").unwrap_or(true),
            stage,
            indexing,
            env,
        })
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableContextBuilder;
    use siteplan_core::{Error, ZoneLookup};

    const TRAKKYFOOD: &str = r#"
        app "trakkyfood-landing-page" auto-branch-deletion=#true {
            source "github" owner="${env.GITHUB_OWNER}" repository="site" credential="env:GITHUB_TOKEN"
        }

        hosted-zone "trakkyfood.it" id="Z0123"

        build-spec "frontend" {
            install "npm ci"
            build "npm run build"
            artifacts "dist" {
                files "**/*"
            }
            cache "node_modules/**/*"
        }

        branch "main" build-spec="frontend" auto-build=#true
        branch "prod" build-spec="frontend" auto-build=#true stage="production"

        domain "dev-landing-page.trakkyfood.it" target="main" root=#true
        domain "trakkyfood.it" target="prod" root=#true

        rule "/<*>" target="/index.html" status="404-200"
    "#;

    fn vars() -> VariableContext {
        VariableContextBuilder::new()
            .with_env("GITHUB_OWNER", "acme")
            .build()
    }

    #[test]
    fn test_parse_trakkyfood() {
        let site = parse_site(TRAKKYFOOD, &vars()).unwrap();
        let app = &site.descriptor;

        assert_eq!(app.name(), "trakkyfood-landing-page");
        assert_eq!(app.source().owner, "acme");
        assert!(app.auto_branch_deletion());
        assert_eq!(app.environments().len(), 2);
        assert_eq!(app.bindings().len(), 2);
        assert_eq!(app.custom_rules(), &[CustomRule::spa_fallback()]);

        let main = app.environment("main").unwrap();
        assert_eq!(main.indexing(), IndexingPolicy::NoIndex);
        let prod = app.environment("prod").unwrap();
        assert_eq!(prod.stage(), Stage::Production);
        assert!(Arc::ptr_eq(main.build_spec(), prod.build_spec()));

        let spec = &site.build_specs["frontend"];
        assert_eq!(spec.install_commands(), &["npm ci".to_string()]);
        assert_eq!(spec.artifact_dir(), "dist");
        assert_eq!(spec.cache_paths(), &["node_modules/**/*".to_string()]);

        let zone = site
            .zones
            .resolve(&DomainName::parse("trakkyfood.it").unwrap())
            .unwrap();
        assert_eq!(zone.id.as_deref(), Some("Z0123"));
    }

    #[test]
    fn test_unresolved_variable_is_an_error() {
        let result = parse_site(TRAKKYFOOD, &VariableContext::new());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_vars_block() {
        let kdl = r#"
            vars {
                zone "trakkyfood.it"
            }
            app "site" {
                source "github" owner="acme" repository="site" credential="env:TOKEN"
            }
            hosted-zone "${zone}"
            build-spec "web" {
                build "npm run build"
                artifacts "dist"
            }
            branch "main"
            domain "dev.${zone}" target="main"
        "#;

        let site = parse_site(kdl, &VariableContext::new()).unwrap();
        let binding = &site.descriptor.bindings()[0];
        assert_eq!(binding.domain.as_str(), "dev.trakkyfood.it");
        assert!(!binding.root_mapping);
    }

    #[test]
    fn test_domain_conflict_surfaces() {
        let kdl = format!(
            "{}\n{}",
            TRAKKYFOOD, r#"domain "trakkyfood.it" target="main" root=#true"#
        );
        let result = parse_site(&kdl, &vars());
        assert!(matches!(
            result,
            Err(ConfigError::Descriptor(Error::DomainConflict { .. }))
        ));
    }

    #[test]
    fn test_unknown_target_surfaces() {
        let kdl = format!(
            "{}\n{}",
            TRAKKYFOOD, r#"domain "staging.trakkyfood.it" target="staging""#
        );
        let result = parse_site(&kdl, &vars());
        assert!(matches!(
            result,
            Err(ConfigError::Descriptor(Error::UnknownTarget(_)))
        ));
    }

    #[test]
    fn test_duplicate_branch_surfaces() {
        let kdl = format!("{}\n{}", TRAKKYFOOD, r#"branch "main" build-spec="frontend""#);
        let result = parse_site(&kdl, &vars());
        assert!(matches!(
            result,
            Err(ConfigError::Descriptor(Error::DuplicateBranch(_)))
        ));
    }

    #[test]
    fn test_unknown_build_spec_reference() {
        let kdl = format!("{}\n{}", TRAKKYFOOD, r#"branch "beta" build-spec="mobile""#);
        let result = parse_site(&kdl, &vars());
        assert!(matches!(result, Err(ConfigError::InvalidReference(_))));
    }

    #[test]
    fn test_build_spec_without_build_commands() {
        let kdl = r#"
            app "site" {
                source "github" owner="acme" repository="site" credential="env:TOKEN"
            }
            build-spec "web" {
                install "npm ci"
                artifacts "dist"
            }
        "#;
        let result = parse_site(kdl, &VariableContext::new());
        assert!(matches!(
            result,
            Err(ConfigError::Descriptor(Error::Configuration(_)))
        ));
    }

    #[test]
    fn test_missing_app() {
        let result = parse_site(r#"hosted-zone "trakkyfood.it""#, &VariableContext::new());
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_branch_env_and_indexing_override() {
        let kdl = r#"
            app "site" {
                source "github" owner="acme" repository="site" credential="env:TOKEN"
                env {
                    SITE_NAME "trakkyfood"
                }
            }
            build-spec "web" {
                build "npm run build"
                artifacts "dist"
            }
            branch "preview" indexing="indexable" auto-build=#false {
                env {
                    PUBLIC_API "https://api.example.com"
                }
            }
        "#;
        let site = parse_site(kdl, &VariableContext::new()).unwrap();
        let app = &site.descriptor;
        assert_eq!(app.env_vars()["SITE_NAME"], "trakkyfood");

        let preview = app.environment("preview").unwrap();
        assert!(!preview.auto_build());
        assert_eq!(preview.indexing(), IndexingPolicy::Indexable);
        assert_eq!(preview.env_vars()["PUBLIC_API"], "https://api.example.com");
    }
}
