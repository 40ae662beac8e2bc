//! Configuration fragments and their loaders
//!
//! A fragment is one parsed configuration file plus its provenance. Each
//! configuration domain is loaded as an ordered list of fragments:
//! 1. Primary (`<name>.json`)
//! 2. Common overrides (`<name>.common.*`)
//! 3. Local overrides (`<name>.local.*`)
//! 4. Environment overrides (`<name>.<env>.*`)

mod fs;

pub use fs::FsFragmentLoader;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Configuration domains compiled into the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDomain {
    App,
    DataSources,
    Models,
    Middleware,
    Components,
}

impl ConfigDomain {
    /// File stem the domain's configuration is stored under.
    pub fn artifact(&self) -> &'static str {
        match self {
            Self::App => "config",
            Self::DataSources => "datasources",
            Self::Models => "model-config",
            Self::Middleware => "middleware",
            Self::Components => "component-config",
        }
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::DataSources => "data source",
            Self::Models => "model",
            Self::Middleware => "middleware",
            Self::Components => "component",
        }
    }
}

impl fmt::Display for ConfigDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact())
    }
}

/// Precedence layer of a fragment, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentLayer {
    Primary,
    Common,
    Local,
    Environment,
    /// Supplied directly through compile options instead of a file
    Inline,
}

/// Where a fragment came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentOrigin {
    pub domain: ConfigDomain,

    pub layer: FragmentLayer,

    /// File path (None for inline fragments)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for inline fragments)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl FragmentOrigin {
    pub fn inline(domain: ConfigDomain) -> Self {
        Self {
            domain,
            layer: FragmentLayer::Inline,
            path: None,
            digest: None,
        }
    }
}

impl fmt::Display for FragmentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path),
            None => write!(f, "inline {} options", self.domain),
        }
    }
}

/// One parsed configuration tree with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFragment {
    pub origin: FragmentOrigin,
    pub tree: Value,
}

impl ConfigFragment {
    pub fn new(origin: FragmentOrigin, tree: Value) -> Self {
        Self { origin, tree }
    }

    pub fn inline(domain: ConfigDomain, tree: Value) -> Self {
        Self::new(FragmentOrigin::inline(domain), tree)
    }
}

/// Source of configuration fragments for a domain.
///
/// `load` returns fragments in precedence order, lowest first. An empty list
/// means the domain is not configured.
pub trait FragmentLoader {
    fn load(&self, root: &Path, env: &str, domain: ConfigDomain) -> Result<Vec<ConfigFragment>>;

    /// Parse a single definition file, such as a model definition.
    fn load_definition(&self, path: &Path) -> Result<Value>;
}
