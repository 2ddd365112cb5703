//! KDL configuration parsing for siteplan.
//!
//! This crate handles parsing of:
//! - Site descriptors (siteplan.kdl)
//! - Variable interpolation

pub mod error;
pub mod site;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use site::{SiteConfig, load_site, parse_site};
pub use variables::{VariableContext, VariableContextBuilder};
