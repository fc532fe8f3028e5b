//! Counters for orchestrated work

use serde::Serialize;

/// Task and workflow counters since the orchestrator started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorMetrics {
    /// Tasks accepted, from workflows or submitted directly
    pub tasks_submitted: usize,
    /// Tasks that completed
    pub tasks_completed: usize,
    /// Tasks that failed for good
    pub tasks_failed: usize,
    /// Tasks cancelled directly or because a dependency did not complete
    pub tasks_cancelled: usize,
    /// Failed attempts that were retried
    pub retries: usize,
    /// Checks that found dependencies incomplete
    pub requeues: usize,
    /// Attempts abandoned by the queue's timeout
    pub timeouts: usize,
    /// Workflow executions started
    pub executions_started: usize,
}

impl OrchestratorMetrics {
    /// Tasks not yet in a terminal state
    pub fn tasks_in_flight(&self) -> usize {
        self.tasks_submitted
            .saturating_sub(self.tasks_completed + self.tasks_failed + self.tasks_cancelled)
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        format!(
            "Orchestrator Metrics:\n\
             - Executions started: {}\n\
             - Tasks: {} submitted, {} completed, {} failed, {} cancelled\n\
             - Retries: {}\n\
             - Requeues: {}\n\
             - Timeouts: {}",
            self.executions_started,
            self.tasks_submitted,
            self.tasks_completed,
            self.tasks_failed,
            self.tasks_cancelled,
            self.retries,
            self.requeues,
            self.timeouts
        )
    }
}
