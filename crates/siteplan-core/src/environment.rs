//! Branch environments: one deployable target per source branch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::build_spec::BuildSpecification;
use crate::rule::{Header, HeaderRule};
use crate::{Error, Result};

/// Environment variables, keyed uniquely and kept sorted.
pub type EnvVars = BTreeMap<String, String>;

/// Header sent by environments that must stay out of search indexes.
pub const NO_INDEX_HEADER: &str = "X-Robots-Tag";
pub const NO_INDEX_VALUE: &str = "noindex, nofollow";

static BRANCH_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").unwrap());

static ENV_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Lifecycle stage of a branch, as the hosting platform classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Production,
    Beta,
    #[default]
    Development,
    Experimental,
    PullRequest,
}

impl Stage {
    /// Guess the stage from a branch name.
    pub fn infer(branch: &str) -> Self {
        match branch {
            "prod" | "production" | "release" | "live" => Stage::Production,
            _ => Stage::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Stage::Production)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Production => write!(f, "production"),
            Stage::Beta => write!(f, "beta"),
            Stage::Development => write!(f, "development"),
            Stage::Experimental => write!(f, "experimental"),
            Stage::PullRequest => write!(f, "pull_request"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "production" | "prod" => Ok(Stage::Production),
            "beta" => Ok(Stage::Beta),
            "development" | "dev" => Ok(Stage::Development),
            "experimental" => Ok(Stage::Experimental),
            "pull_request" => Ok(Stage::PullRequest),
            _ => Err(Error::config(format!("unknown stage: {}", s))),
        }
    }
}

/// Whether crawlers may index what an environment serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingPolicy {
    Indexable,
    NoIndex,
}

impl IndexingPolicy {
    /// Production is indexable; everything else is not.
    pub fn for_stage(stage: Stage) -> Self {
        if stage.is_production() {
            IndexingPolicy::Indexable
        } else {
            IndexingPolicy::NoIndex
        }
    }
}

impl std::fmt::Display for IndexingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexingPolicy::Indexable => write!(f, "indexable"),
            IndexingPolicy::NoIndex => write!(f, "noindex"),
        }
    }
}

/// Settings for registering a branch environment.
#[derive(Debug, Clone)]
pub struct BranchOptions {
    pub build_spec: Arc<BuildSpecification>,
    pub env_vars: EnvVars,
    pub auto_build: bool,
    pub stage: Stage,
    /// Overrides the stage-derived policy when set.
    pub indexing: Option<IndexingPolicy>,
}

impl BranchOptions {
    pub fn new(build_spec: Arc<BuildSpecification>) -> Self {
        Self {
            build_spec,
            env_vars: EnvVars::new(),
            auto_build: true,
            stage: Stage::default(),
            indexing: None,
        }
    }

    pub fn env_vars(mut self, env_vars: EnvVars) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn auto_build(mut self, auto_build: bool) -> Self {
        self.auto_build = auto_build;
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn indexing(mut self, indexing: IndexingPolicy) -> Self {
        self.indexing = Some(indexing);
        self
    }
}

/// A named deployment target bound to one source branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEnvironment {
    name: String,
    build_spec: Arc<BuildSpecification>,
    env_vars: EnvVars,
    auto_build: bool,
    stage: Stage,
    indexing: IndexingPolicy,
}

impl BranchEnvironment {
    pub(crate) fn new(name: &str, options: BranchOptions) -> Result<Self> {
        validate_branch_name(name)?;
        for key in options.env_vars.keys() {
            validate_env_key(key)?;
        }
        let indexing = options
            .indexing
            .unwrap_or_else(|| IndexingPolicy::for_stage(options.stage));

        Ok(Self {
            name: name.to_string(),
            build_spec: options.build_spec,
            env_vars: options.env_vars,
            auto_build: options.auto_build,
            stage: options.stage,
            indexing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_spec(&self) -> &Arc<BuildSpecification> {
        &self.build_spec
    }

    pub fn env_vars(&self) -> &EnvVars {
        &self.env_vars
    }

    pub fn auto_build(&self) -> bool {
        self.auto_build
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn indexing(&self) -> IndexingPolicy {
        self.indexing
    }

    /// Host label the platform uses for this branch's default URL.
    pub fn host_label(&self) -> String {
        self.name.replace(['/', '.', '_'], "-").to_lowercase()
    }

    /// Cache namespace, unique per application and branch.
    pub fn cache_namespace(&self, app_name: &str) -> String {
        format!("{}/{}/cache", app_name, self.name)
    }

    /// Artifact namespace, unique per application and branch.
    pub fn artifact_namespace(&self, app_name: &str) -> String {
        format!("{}/{}/artifacts", app_name, self.name)
    }

    /// Response headers this environment applies to every request.
    pub fn header_rules(&self) -> Vec<HeaderRule> {
        match self.indexing {
            IndexingPolicy::Indexable => Vec::new(),
            IndexingPolicy::NoIndex => vec![HeaderRule {
                pattern: "**/*".to_string(),
                headers: vec![Header {
                    key: NO_INDEX_HEADER.to_string(),
                    value: NO_INDEX_VALUE.to_string(),
                }],
            }],
        }
    }
}

fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("branch name is empty"));
    }
    if !BRANCH_NAME_REGEX.is_match(name)
        || name.contains("..")
        || name.starts_with(['-', '/'])
        || name.ends_with(['/', '.'])
    {
        return Err(Error::config(format!("invalid branch name: {:?}", name)));
    }
    Ok(())
}

pub(crate) fn validate_env_key(key: &str) -> Result<()> {
    if !ENV_KEY_REGEX.is_match(key) {
        return Err(Error::config(format!(
            "invalid environment variable name: {:?}",
            key
        )));
    }
    Ok(())
}
