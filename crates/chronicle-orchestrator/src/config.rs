//! Orchestrator configuration

use crate::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Queue and retry settings for the orchestrator
///
/// Loaded from the `[orchestrator]` table of a TOML file:
///
/// ```toml
/// [orchestrator]
/// queue_name = "agent-tasks"
/// concurrency = 5
/// default_max_retries = 3
/// default_step_timeout_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Queue tasks are dispatched on
    pub queue_name: String,

    /// Tasks run at the same time
    pub concurrency: usize,

    /// Retries allowed for a task whose step does not say otherwise
    pub default_max_retries: u32,

    /// Step timeout when a step does not set one
    pub default_step_timeout_secs: u64,

    /// Delay before re-checking a task whose dependencies are not complete
    pub requeue_delay_ms: u64,

    /// Delay before retrying a failed task
    pub retry_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_name: "agent-tasks".to_string(),
            concurrency: 5,
            default_max_retries: 3,
            default_step_timeout_secs: 300,
            requeue_delay_ms: 250,
            retry_delay_ms: 1000,
        }
    }
}

impl OrchestratorConfig {
    /// Load from a TOML file containing an `[orchestrator]` table
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OrchestratorError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OrchestratorError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse from TOML text; a missing table yields the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, OrchestratorError> {
        #[derive(Deserialize)]
        struct Wrapped {
            #[serde(default)]
            orchestrator: OrchestratorConfig,
        }

        let wrapped: Wrapped =
            toml::from_str(contents).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        wrapped.orchestrator.validate()?;
        Ok(wrapped.orchestrator)
    }

    /// Reject settings the queue cannot run with
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.queue_name.trim().is_empty() {
            return Err(OrchestratorError::Config("queue_name must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(OrchestratorError::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Default step timeout as Duration
    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_secs(self.default_step_timeout_secs)
    }

    pub(crate) fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    pub(crate) fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
