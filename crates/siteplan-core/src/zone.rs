//! Hosted zones the deployer controls.

use serde::{Deserialize, Serialize};

use crate::domain::DomainName;

/// An externally managed DNS zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub name: DomainName,
    /// Provider-side identifier, if known.
    pub id: Option<String>,
}

impl HostedZone {
    pub fn new(name: DomainName) -> Self {
        Self { name, id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Resolves the hosted zone a domain belongs to.
pub trait ZoneLookup {
    fn resolve(&self, domain: &DomainName) -> Option<HostedZone>;
}

/// A fixed set of zones, e.g. declared in configuration or discovered
/// ahead of time from the DNS provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDirectory {
    zones: Vec<HostedZone>,
}

impl ZoneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone, replacing an existing zone of the same name.
    pub fn insert(&mut self, zone: HostedZone) {
        match self.zones.iter_mut().find(|z| z.name == zone.name) {
            Some(existing) => *existing = zone,
            None => self.zones.push(zone),
        }
    }

    pub fn with_zone(mut self, zone: HostedZone) -> Self {
        self.insert(zone);
        self
    }

    pub fn zones(&self) -> &[HostedZone] {
        &self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneLookup for ZoneDirectory {
    /// Picks the most specific zone containing the domain.
    fn resolve(&self, domain: &DomainName) -> Option<HostedZone> {
        self.zones
            .iter()
            .filter(|zone| domain.is_within(&zone.name))
            .max_by_key(|zone| zone.name.as_str().len())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_longest_suffix() {
        let zones = ZoneDirectory::new()
            .with_zone(HostedZone::new(name("trakkyfood.it")).with_id("Z1"))
            .with_zone(HostedZone::new(name("eu.trakkyfood.it")).with_id("Z2"));

        let zone = zones.resolve(&name("shop.eu.trakkyfood.it")).unwrap();
        assert_eq!(zone.id.as_deref(), Some("Z2"));

        let zone = zones.resolve(&name("dev-landing-page.trakkyfood.it")).unwrap();
        assert_eq!(zone.id.as_deref(), Some("Z1"));

        assert!(zones.resolve(&name("example.com")).is_none());
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut zones = ZoneDirectory::new();
        zones.insert(HostedZone::new(name("trakkyfood.it")));
        zones.insert(HostedZone::new(name("trakkyfood.it")).with_id("Z9"));
        assert_eq!(zones.zones().len(), 1);
        assert_eq!(zones.zones()[0].id.as_deref(), Some("Z9"));
    }
}
