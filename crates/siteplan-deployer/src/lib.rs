//! Hosting platform backends for siteplan.
//!
//! Provides:
//! - Traits for the hosting platform, DNS provider and source provider
//! - Idempotent apply of an application descriptor
//! - Certificate reconciliation
//! - In-memory backends for dry-run planning and tests

pub mod apply;
pub mod memory;
pub mod platform;
pub mod reconcile;
pub mod secrets;

pub use apply::{ApplyReport, Deployer};
pub use memory::{InMemoryPlatform, StaticDnsProvider, StaticSecretStore, StaticSourceProvider};
pub use platform::{
    AppDeclaration, BranchDeclaration, Change, DnsProvider, DomainDeclaration, HostingPlatform,
    SourceProvider,
};
pub use reconcile::{CertificateUpdate, reconcile_certificates};
pub use secrets::EnvSecretStore;
