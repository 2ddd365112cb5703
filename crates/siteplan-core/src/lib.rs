//! Core domain types for siteplan deployment descriptors.
//!
//! This crate contains:
//! - Resource identifiers and common types
//! - Build specifications shared across branches
//! - Branch environments and their indexing policy
//! - Domain bindings and hosted zones
//! - The application descriptor aggregate and its outputs
//! - Secret abstractions for source repository credentials

pub mod application;
pub mod build_spec;
pub mod domain;
pub mod environment;
pub mod error;
pub mod id;
pub mod output;
pub mod repository;
pub mod rule;
pub mod secret;
pub mod zone;

pub use application::{AppIdentity, ApplicationDescriptor};
pub use build_spec::BuildSpecification;
pub use domain::{CertificateStatus, DomainBinding, DomainName};
pub use environment::{BranchEnvironment, BranchOptions, EnvVars, IndexingPolicy, Stage};
pub use error::{Error, Result};
pub use id::ResourceId;
pub use output::Outputs;
pub use repository::{GitProvider, SourceRepository};
pub use rule::{CustomRule, RedirectStatus};
pub use zone::{HostedZone, ZoneDirectory, ZoneLookup};
