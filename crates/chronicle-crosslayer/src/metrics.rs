//! Metrics collection for cross-layer sweeps

use std::collections::BTreeMap;

/// Metrics collected across validation runs
///
/// Tracks violations found, repaired and failed per rule.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Violations found per rule
    pub found: BTreeMap<String, usize>,

    /// Violations repaired per rule
    pub repaired: BTreeMap<String, usize>,

    /// Repairs that failed per rule
    pub failed: BTreeMap<String, usize>,

    /// Completed validation runs
    pub run_count: usize,

    /// Total time spent validating, in milliseconds
    pub total_runtime_ms: u64,
}

impl EngineMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record violations found by a rule
    pub fn record_found(&mut self, rule_id: &str, count: usize) {
        *self.found.entry(rule_id.to_string()).or_insert(0) += count;
    }

    /// Record a successful repair
    pub fn record_repaired(&mut self, rule_id: &str) {
        *self.repaired.entry(rule_id.to_string()).or_insert(0) += 1;
    }

    /// Record a failed repair
    pub fn record_failed(&mut self, rule_id: &str) {
        *self.failed.entry(rule_id.to_string()).or_insert(0) += 1;
    }

    /// Record a completed run
    pub fn record_run(&mut self, runtime_ms: u64) {
        self.run_count += 1;
        self.total_runtime_ms += runtime_ms;
    }

    /// Violations found across all rules
    pub fn total_found(&self) -> usize {
        self.found.values().sum()
    }

    /// Repairs across all rules
    pub fn total_repaired(&self) -> usize {
        self.repaired.values().sum()
    }

    /// Failed repairs across all rules
    pub fn total_failed(&self) -> usize {
        self.failed.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Cross-Layer Metrics Summary".to_string(),
            "===========================".to_string(),
            format!("Validation runs: {}", self.run_count),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            String::new(),
        ];

        for (title, counts, total) in [
            ("Violations found by rule:", &self.found, self.total_found()),
            ("Repairs by rule:", &self.repaired, self.total_repaired()),
            ("Failed repairs by rule:", &self.failed, self.total_failed()),
        ] {
            if counts.is_empty() {
                continue;
            }
            lines.push(title.to_string());
            for (rule_id, count) in counts {
                lines.push(format!("  {}: {}", rule_id, count));
            }
            lines.push(format!("  Total: {}", total));
            lines.push(String::new());
        }

        lines.join("\n")
    }
}
