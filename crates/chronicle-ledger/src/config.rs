//! Ledger configuration

use chronicle_domain::DEFAULT_BRANCH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),
}

/// Ledger configuration loaded from TOML
///
/// ```toml
/// signing_secret = "..."
/// link_parent_commits = true
/// tool_name = "provenance"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Secret the commit signing key is derived from
    pub signing_secret: String,

    /// Default parent to the branch head when the caller names none
    #[serde(default = "default_link_parent_commits")]
    pub link_parent_commits: bool,

    /// Tool name recorded on actions the ledger writes itself
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Branch used for system commits
    #[serde(default = "default_branch")]
    pub system_branch: String,
}

fn default_link_parent_commits() -> bool {
    true
}

fn default_tool_name() -> String {
    "provenance".to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(contents)?;

        if config.signing_secret.trim().is_empty() {
            return Err(ConfigError::MissingField("signing_secret".to_string()));
        }

        Ok(config)
    }

    /// Create a configuration for testing
    pub fn default_test_config() -> Self {
        Self {
            signing_secret: "test-signing-secret-do-not-use-in-production".to_string(),
            link_parent_commits: true,
            tool_name: default_tool_name(),
            system_branch: default_branch(),
        }
    }
}
