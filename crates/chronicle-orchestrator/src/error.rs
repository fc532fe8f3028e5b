//! Error types for the task orchestrator

use thiserror::Error;

/// Error returned by an [`Agent`](crate::Agent)
///
/// Agents wrap whatever their domain operation raised; the orchestrator only
/// records the message on the task.
pub type AgentError = Box<dyn std::error::Error + Send + Sync>;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Missing or blank organisation id
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// No workflow registered under this id
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// No task or execution with this id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// No agent registered under this name
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// A task failed on every allowed attempt
    #[error("Task {task_id} failed after {attempts} attempts: {last_error}")]
    TaskRetryExhausted {
        /// Task that gave up
        task_id: String,
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        last_error: String,
    },

    /// Job queue failure
    #[error("Queue error: {0}")]
    Queue(String),

    /// A job or wait exceeded its time limit
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
