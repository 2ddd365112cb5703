//! Build specifications shared by branch environments.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Build spec schema version understood by the hosting platform.
pub const BUILD_SPEC_VERSION: &str = "1.0";

/// Artifact glob used when none is given: everything under the base directory.
pub const DEFAULT_ARTIFACT_GLOB: &str = "**/*";

/// Install, build, artifact and cache steps for a static frontend.
///
/// Immutable once defined. Environments share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpecification {
    install_commands: Vec<String>,
    build_commands: Vec<String>,
    artifact_dir: String,
    artifact_globs: Vec<String>,
    cache_paths: Vec<String>,
}

impl BuildSpecification {
    /// Define a build specification.
    ///
    /// Fails if the artifact directory is blank or there are no build
    /// commands, since such a build can never produce artifacts.
    pub fn define(
        install_commands: Vec<String>,
        build_commands: Vec<String>,
        artifact_dir: impl Into<String>,
        artifact_globs: Vec<String>,
        cache_paths: Vec<String>,
    ) -> Result<Self> {
        let artifact_dir = artifact_dir.into();
        if artifact_dir.trim().is_empty() {
            return Err(Error::config("build spec artifact directory is empty"));
        }
        if build_commands.iter().all(|c| c.trim().is_empty()) {
            return Err(Error::config("build spec has no build commands"));
        }
        if let Some(blank) = install_commands
            .iter()
            .chain(&build_commands)
            .find(|c| c.trim().is_empty())
        {
            return Err(Error::config(format!(
                "build spec contains a blank command: {:?}",
                blank
            )));
        }

        let artifact_globs = if artifact_globs.is_empty() {
            vec![DEFAULT_ARTIFACT_GLOB.to_string()]
        } else {
            artifact_globs
        };

        Ok(Self {
            install_commands,
            build_commands,
            artifact_dir: artifact_dir.trim().to_string(),
            artifact_globs,
            cache_paths,
        })
    }

    pub fn install_commands(&self) -> &[String] {
        &self.install_commands
    }

    pub fn build_commands(&self) -> &[String] {
        &self.build_commands
    }

    pub fn artifact_dir(&self) -> &str {
        &self.artifact_dir
    }

    pub fn artifact_globs(&self) -> &[String] {
        &self.artifact_globs
    }

    pub fn cache_paths(&self) -> &[String] {
        &self.cache_paths
    }

    /// The structured document consumed by the hosting platform.
    pub fn document(&self) -> BuildSpecDocument {
        let pre_build = if self.install_commands.is_empty() {
            None
        } else {
            Some(PhaseDocument {
                commands: self.install_commands.clone(),
            })
        };
        let cache = if self.cache_paths.is_empty() {
            None
        } else {
            Some(CacheDocument {
                paths: self.cache_paths.clone(),
            })
        };

        BuildSpecDocument {
            version: BUILD_SPEC_VERSION.to_string(),
            frontend: FrontendDocument {
                phases: PhasesDocument {
                    pre_build,
                    build: PhaseDocument {
                        commands: self.build_commands.clone(),
                    },
                },
                artifacts: ArtifactsDocument {
                    base_directory: self.artifact_dir.clone(),
                    files: self.artifact_globs.clone(),
                },
                cache,
            },
        }
    }

    /// Serialize to the YAML form the platform expects. Field order is
    /// fixed by the document structs, so the output is stable.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.document())
            .map_err(|e| Error::config(format!("failed to serialize build spec: {}", e)))
    }
}

/// Top-level build spec document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpecDocument {
    pub version: String,
    pub frontend: FrontendDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendDocument {
    pub phases: PhasesDocument,
    pub artifacts: ArtifactsDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheDocument>,
}

/// Install runs as `preBuild`, always before `build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhasesDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<PhaseDocument>,
    pub build: PhaseDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDocument {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsDocument {
    pub base_directory: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn frontend_spec() -> BuildSpecification {
        BuildSpecification::define(
            strings(&["npm ci"]),
            strings(&["npm run build"]),
            "dist",
            strings(&["**/*"]),
            strings(&["node_modules/**/*"]),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_build_commands_rejected() {
        let result = BuildSpecification::define(
            strings(&["npm ci"]),
            vec![],
            "dist",
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_artifact_dir_rejected() {
        let result =
            BuildSpecification::define(vec![], strings(&["npm run build"]), "  ", vec![], vec![]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_blank_command_rejected() {
        let result = BuildSpecification::define(
            strings(&[""]),
            strings(&["npm run build"]),
            "dist",
            vec![],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_artifact_glob() {
        let spec =
            BuildSpecification::define(vec![], strings(&["make"]), "public", vec![], vec![])
                .unwrap();
        assert_eq!(spec.artifact_globs(), &["**/*".to_string()]);
    }

    #[test]
    fn test_yaml_is_deterministic() {
        let spec = frontend_spec();
        let first = spec.to_yaml().unwrap();
        let second = spec.to_yaml().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, frontend_spec().to_yaml().unwrap());
    }

    #[test]
    fn test_yaml_layout() {
        let yaml = frontend_spec().to_yaml().unwrap();
        let pre_build = yaml.find("preBuild:").unwrap();
        let build = yaml.find("    build:").unwrap();
        assert!(pre_build < build, "install phase must precede build:\n{}", yaml);
        assert!(yaml.contains("baseDirectory: dist"));
        assert!(yaml.contains("node_modules/**/*"));

        let doc: BuildSpecDocument = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc, frontend_spec().document());
    }

    #[test]
    fn test_optional_sections_omitted() {
        let spec =
            BuildSpecification::define(vec![], strings(&["hugo"]), "public", vec![], vec![])
                .unwrap();
        let yaml = spec.to_yaml().unwrap();
        assert!(!yaml.contains("preBuild"));
        assert!(!yaml.contains("cache"));
    }
}
