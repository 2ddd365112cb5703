//! Variable interpolation for site configurations.
//!
//! Supports variables like:
//! - `${env.VAR_NAME}` - Environment variable
//! - `${name}` - Custom variable from a `vars` block or the command line

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Custom variables defined by user
    pub custom: HashMap<String, String>,
}

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding the current process environment.
    pub fn from_process_env() -> Self {
        let mut ctx = Self::new();
        ctx.populate_env();
        ctx
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        for (key, value) in std::env::vars() {
            self.env.insert(key, value);
        }
    }

    /// Add a custom variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.custom.insert(name.to_string(), value.into());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["env", name] => self.env.get(*name).cloned(),
            [name] => self.custom.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string. Unknown variables are left
    /// in place so callers can report them.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Names of variables in `input` that do not resolve.
    pub fn unresolved(&self, input: &str) -> Vec<String> {
        VAR_REGEX
            .captures_iter(input)
            .map(|caps| caps[1].to_string())
            .filter(|name| self.resolve(name).is_none())
            .collect()
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_variables() {
        let ctx = VariableContextBuilder::new()
            .with_env("GITHUB_OWNER", "acme")
            .with_env("GITHUB_REPO", "site")
            .build();

        let result = ctx.interpolate("${env.GITHUB_OWNER}/${env.GITHUB_REPO}");
        assert_eq!(result, "acme/site");
    }

    #[test]
    fn test_custom_variables() {
        let mut ctx = VariableContext::new();
        ctx.set("zone", "trakkyfood.it");

        let result = ctx.interpolate("dev-landing-page.${zone}");
        assert_eq!(result, "dev-landing-page.trakkyfood.it");
    }

    #[test]
    fn test_unknown_variable_preserved_and_reported() {
        let ctx = VariableContext::new();
        let result = ctx.interpolate("owner ${env.MISSING}");
        assert_eq!(result, "owner ${env.MISSING}");
        assert_eq!(ctx.unresolved(&result), vec!["env.MISSING".to_string()]);
    }

    #[test]
    fn test_glob_text_untouched() {
        let ctx = VariableContext::new();
        assert_eq!(ctx.interpolate("/<*>"), "/<*>");
        assert_eq!(ctx.interpolate("node_modules/**/*"), "node_modules/**/*");
    }
}
