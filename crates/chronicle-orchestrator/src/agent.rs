//! Agents perform the domain operation behind each task

use crate::{AgentError, Task};
use async_trait::async_trait;
use serde_json::Value;

/// A named worker the orchestrator hands tasks to
///
/// An agent typically opens a commit in the provenance ledger, records its
/// actions and returns a summary that downstream tasks receive under
/// `dependency_results`. Returning an error fails the attempt; the
/// orchestrator decides whether to retry.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use chronicle_orchestrator::{Agent, AgentError, Task};
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Agent for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn execute(&self, task: &Task) -> Result<Value, AgentError> {
///         Ok(json!({ "echo": task.payload }))
///     }
/// }
/// ```
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name workflow steps refer to
    fn name(&self) -> &str;

    /// Run one attempt of a task
    async fn execute(&self, task: &Task) -> Result<Value, AgentError>;
}
