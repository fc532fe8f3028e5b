//! Workflow definitions and execution records

use chronicle_domain::{now_millis, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Predicate over the workflow context deciding whether a step runs
#[derive(Clone)]
pub struct StepCondition(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl StepCondition {
    /// Wrap an arbitrary predicate
    pub fn new(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Run only when `context[key] == expected`
    pub fn field_equals(key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        Self::new(move |context| context.get(&key) == Some(&expected))
    }

    /// Evaluate against a context
    pub fn evaluate(&self, context: &Value) -> bool {
        (self.0)(context)
    }
}

impl std::fmt::Debug for StepCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StepCondition(..)")
    }
}

/// One step of a workflow, run by one agent
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    /// Agent that runs the step
    pub agent: String,
    /// Operation passed to the agent as the task type
    pub operation: String,
    /// Skip the step when this returns false
    pub condition: Option<StepCondition>,
    /// Time limit for one attempt; the orchestrator default when `None`
    pub timeout: Option<Duration>,
    /// Retries allowed after failed attempts; the orchestrator default when `None`
    pub max_retries: Option<u32>,
}

impl WorkflowStep {
    /// A step with no condition and default limits
    pub fn new(agent: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            operation: operation.into(),
            condition: None,
            timeout: None,
            max_retries: None,
        }
    }

    /// Run only when the condition holds
    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the per-attempt time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retries allowed after failed attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Whether the step runs for `context`
    pub fn applies_to(&self, context: &Value) -> bool {
        self.condition.as_ref().is_none_or(|c| c.evaluate(context))
    }
}

/// Event that starts a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    /// Event type, e.g. `file.created`
    pub event: String,
    /// Fields the event data must carry; an array value means "any of"
    #[serde(default)]
    pub conditions: Map<String, Value>,
}

impl WorkflowTrigger {
    /// Trigger on every event of this type
    pub fn on(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            conditions: Map::new(),
        }
    }

    /// Require `data[key]` to equal `expected` (or be one of its elements)
    pub fn with_condition(mut self, key: impl Into<String>, expected: Value) -> Self {
        self.conditions.insert(key.into(), expected);
        self
    }

    /// Whether an event matches
    pub fn matches(&self, event_type: &str, data: &Value) -> bool {
        self.event == event_type
            && self.conditions.iter().all(|(key, expected)| {
                let Some(actual) = data.get(key) else {
                    return false;
                };
                match expected {
                    Value::Array(options) => options.contains(actual),
                    other => actual == other,
                }
            })
    }
}

/// An ordered chain of steps
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Unique id
    pub id: String,
    /// Display name
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<WorkflowStep>,
    /// Event that starts the workflow
    pub trigger: Option<WorkflowTrigger>,
    /// Disabled workflows ignore events but can still be executed directly
    pub enabled: bool,
}

impl Workflow {
    /// An enabled workflow with no trigger
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps,
            trigger: None,
            enabled: true,
        }
    }

    /// Start on matching events
    pub fn triggered_by(mut self, trigger: WorkflowTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Whether an event starts this workflow
    pub fn is_triggered_by(&self, event_type: &str, data: &Value) -> bool {
        self.enabled
            && self
                .trigger
                .as_ref()
                .is_some_and(|t| t.matches(event_type, data))
    }
}

/// Overall state of a workflow execution, derived from its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Some task is pending or running
    Running,
    /// Every task completed
    Completed,
    /// A task failed
    Failed,
    /// A task was cancelled and none failed
    Cancelled,
}

impl ExecutionStatus {
    /// No task can change any more
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Record of one run of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Execution id
    pub id: String,
    /// Workflow that ran
    pub workflow_id: String,
    /// Owning organisation
    pub org_id: String,
    /// User the workflow runs for
    pub user_id: String,
    /// One task per executed step, in order
    pub task_ids: Vec<String>,
    /// Indexes of steps whose condition was false
    pub skipped_steps: Vec<usize>,
    /// When the execution started
    pub started_at: Timestamp,
}

impl WorkflowExecution {
    pub(crate) fn new(workflow_id: &str, org_id: &str, user_id: &str) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            workflow_id: workflow_id.to_string(),
            org_id: org_id.to_string(),
            user_id: user_id.to_string(),
            task_ids: Vec::new(),
            skipped_steps: Vec::new(),
            started_at: now_millis(),
        }
    }
}
