//! Declared outputs: identifiers and URLs describing a deployed descriptor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A single named output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: String,
    pub description: String,
}

/// Output name to value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, OutputValue>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.0.insert(
            name.into(),
            OutputValue {
                value: value.into(),
                description: description.into(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every URL-valued output, parsed.
    pub fn urls(&self) -> Vec<Url> {
        self.0
            .iter()
            .filter(|(name, _)| name.ends_with("_url"))
            .filter_map(|(_, v)| Url::parse(&v.value).ok())
            .collect()
    }

    /// Flatten to name → value.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}
