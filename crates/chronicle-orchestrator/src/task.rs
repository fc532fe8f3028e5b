//! Tasks and their lifecycle

use chronicle_domain::{now_millis, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Lifecycle of a task
///
/// ```text
/// Pending -> Running -> Completed
///    ^          |
///    +----------+ (retry)     -> Failed    (attempts exhausted)
/// Pending -> Cancelled                     (dependency failed or cancelled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for dispatch
    Pending,
    /// An agent is working on it
    Running,
    /// Finished with a result
    Completed,
    /// Gave up after its last attempt
    Failed,
    /// Will never run
    Cancelled,
}

impl TaskStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of agent work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Time-ordered id (UUIDv7)
    pub id: String,
    /// Operation the agent performs
    pub task_type: String,
    /// Agent that runs it
    pub agent: String,
    /// Input; dependency results are added under `dependency_results`
    pub payload: Value,
    /// Owning organisation
    pub org_id: String,
    /// User the work is done for
    pub user_id: String,
    /// Current state
    pub status: TaskStatus,
    /// Tasks that must complete first
    pub dependencies: Vec<String>,
    /// Times the task was requeued after a failed attempt
    pub retry_count: u32,
    /// Requeues allowed after failures; the failure after the last one is final
    pub max_retries: u32,
    /// Times the task was checked before its dependencies completed
    pub requeue_count: u32,
    /// Time limit for one attempt, in milliseconds
    pub timeout_ms: u64,
    /// Agent output once completed
    pub result: Option<Value>,
    /// Error of the latest failed attempt
    pub error: Option<String>,
    /// Workflow execution the task belongs to
    pub execution_id: Option<String>,
    /// When the task was created
    pub created_at: Timestamp,
    /// When the latest attempt started
    pub started_at: Option<Timestamp>,
    /// When the task reached a terminal state
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Create a pending task with no dependencies
    pub fn new(
        task_type: impl Into<String>,
        agent: impl Into<String>,
        payload: Value,
        org_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            task_type: task_type.into(),
            agent: agent.into(),
            payload,
            org_id: org_id.into(),
            user_id: user_id.into(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            retry_count: 0,
            max_retries: 3,
            requeue_count: 0,
            timeout_ms: 300_000,
            result: None,
            error: None,
            execution_id: None,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Require other tasks to complete first
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set the number of retries allowed after failed attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the time limit for one attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Time limit for one attempt
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed_at = Some(now_millis());
    }
}
