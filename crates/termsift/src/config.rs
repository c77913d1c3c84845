//! Configuration for query parsing and the in-memory index.
//!
//! Configuration is plain data with serde defaults, so a partial file only
//! overrides what it names:
//!
//! ```yaml
//! search:
//!   default_operator: or
//!   default_fields: [name, synonyms]
//! index:
//!   max_hits: 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Operator placed between adjacent clauses that have no explicit operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperator {
    /// `a b` means `a AND b`.
    #[default]
    And,
    /// `a b` means `a OR b`.
    Or,
}

/// Free-text parsing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Operator between adjacent clauses.
    pub default_operator: DefaultOperator,
    /// Fields searched by terms without a `field:` qualifier.
    ///
    /// Empty means every indexed field.
    pub default_fields: Vec<String>,
    /// Accept `term*` prefix queries.
    pub allow_wildcards: bool,
    /// Accept `/pattern/` regular expression queries.
    pub allow_regex: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_operator: DefaultOperator::And,
            default_fields: Vec::new(),
            allow_wildcards: true,
            allow_regex: true,
        }
    }
}

/// Resource limits of the in-memory index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of hits collected per search.
    ///
    /// Hits beyond the cap are still counted but never returned, and pages
    /// built from a capped search report themselves as incomplete.
    pub max_hits: Option<usize>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query parsing options.
    pub search: SearchConfig,
    /// Index limits.
    pub index: IndexConfig,
}

impl Config {
    /// Parses configuration from YAML.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Parses configuration from JSON.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Loads configuration from a file, picking the format by extension.
    ///
    /// `.json` files are read as JSON; `.yaml`, `.yml` and anything else as
    /// YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Config::from_json_str(&source),
            _ => Config::from_yaml_str(&source),
        }
        .map_err(|err| match err {
            SearchError::Config(message) => {
                SearchError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded search configuration");
        Ok(config)
    }
}
