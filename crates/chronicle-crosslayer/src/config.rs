//! Configuration for cross-layer validation
//!
//! Controls automatic repair and the background sweep schedule.

use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the cross-layer engine and its worker
///
/// # Examples
///
/// ```
/// use chronicle_crosslayer::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert!(config.auto_repair);
/// assert_eq!(config.sweep_interval_minutes, 60);
///
/// // Report violations without touching the graph
/// let config = EngineConfig::report_only();
/// assert!(!config.auto_repair);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run a rule's repair for each violation it finds
    /// Default: true
    #[serde(default = "default_auto_repair")]
    pub auto_repair: bool,

    /// How often the background worker sweeps (in minutes)
    /// Default: every 60 minutes
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,

    /// Organisations the background worker sweeps
    #[serde(default)]
    pub org_ids: Vec<String>,

    /// Rules registered but switched off at startup
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

fn default_auto_repair() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_repair: true,
            sweep_interval_minutes: default_sweep_interval(),
            org_ids: Vec::new(),
            disabled_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Detect and record violations only
    pub fn report_only() -> Self {
        Self {
            auto_repair: false,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file with an `[engine]` table or bare keys
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        #[derive(Deserialize)]
        struct Wrapped {
            engine: EngineConfig,
        }

        let table: toml::Table =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        let config = if table.contains_key("engine") {
            toml::from_str::<Wrapped>(contents)
                .map(|w| w.engine)
                .map_err(|e| EngineError::Config(e.to_string()))?
        } else {
            toml::from_str::<EngineConfig>(contents).map_err(|e| EngineError::Config(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sweep_interval_minutes == 0 {
            return Err(EngineError::Config(
                "sweep_interval_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes * 60)
    }
}
