//! Workflow scheduling over a job queue
//!
//! Every task is one `process_task` job. When a job comes up, the task runs
//! only if all of its dependencies have completed; otherwise it goes back on
//! the queue. A failed attempt is requeued until `retry_count` reaches
//! `max_retries`; the next failure fails the task and cancels everything
//! waiting on it.

use crate::{
    Agent, ExecutionStatus, InMemoryJobQueue, Job, JobHandler, JobOptions, JobQueue,
    OrchestratorConfig, OrchestratorError, OrchestratorMetrics, Task, TaskStatus, WorkerOptions,
    Workflow, WorkflowExecution,
};
use async_trait::async_trait;
use chronicle_domain::{is_valid_org_id, now_millis};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Notify;

const PROCESS_TASK: &str = "process_task";

#[derive(Default)]
struct State {
    tasks: HashMap<String, Task>,
    executions: HashMap<String, WorkflowExecution>,
    metrics: OrchestratorMetrics,
}

impl State {
    /// Cancel every pending task that transitively depends on `root`
    fn cancel_dependents(&mut self, root: &str) -> usize {
        let mut queue = VecDeque::from([root.to_string()]);
        let mut cancelled = 0;

        while let Some(blocker) = queue.pop_front() {
            let dependents: Vec<String> = self
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending && t.dependencies.contains(&blocker))
                .map(|t| t.id.clone())
                .collect();

            for id in dependents {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.error = Some(format!("dependency {} did not complete", blocker));
                    task.finish(TaskStatus::Cancelled);
                    tracing::warn!("Cancelled task {}: dependency {} did not complete", id, blocker);
                }
                cancelled += 1;
                queue.push_back(id);
            }
        }

        self.metrics.tasks_cancelled += cancelled;
        cancelled
    }

    fn execution_status(&self, execution_id: &str) -> Result<ExecutionStatus, OrchestratorError> {
        let execution = self
            .executions
            .get(execution_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(format!("execution {}", execution_id)))?;

        let statuses: Vec<TaskStatus> = execution
            .task_ids
            .iter()
            .filter_map(|id| self.tasks.get(id).map(|t| t.status))
            .collect();

        Ok(if statuses.iter().any(|s| !s.is_terminal()) {
            ExecutionStatus::Running
        } else if statuses.contains(&TaskStatus::Failed) {
            ExecutionStatus::Failed
        } else if statuses.contains(&TaskStatus::Cancelled) {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Completed
        })
    }
}

enum Dispatch {
    Skip,
    Requeue(Duration),
    Run(Task),
}

struct Inner {
    queue: Arc<dyn JobQueue>,
    config: OrchestratorConfig,
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    workflows: RwLock<HashMap<String, Workflow>>,
    state: Mutex<State>,
    changed: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    async fn enqueue(&self, task_id: &str, timeout: Duration) -> Result<String, OrchestratorError> {
        self.queue
            .add_job(
                &self.config.queue_name,
                PROCESS_TASK,
                json!({ "task_id": task_id }),
                JobOptions {
                    timeout: Some(timeout),
                },
            )
            .await
    }

    /// Put a task back on the queue after `delay` without holding a worker slot
    fn schedule(self: &Arc<Self>, task_id: &str, timeout: Duration, delay: Duration) {
        let inner = Arc::clone(self);
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = inner.enqueue(&task_id, timeout).await {
                tracing::error!("Failed to requeue task {}: {}", task_id, e);
            }
        });
    }

    /// Decide what to do with a task whose job came up
    fn begin(&self, task_id: &str) -> Dispatch {
        let mut state = self.state();

        let Some(task) = state.tasks.get(task_id) else {
            tracing::warn!("Job for unknown task {}", task_id);
            return Dispatch::Skip;
        };
        if task.status != TaskStatus::Pending {
            tracing::debug!("Task {} is {}, skipping", task_id, task.status);
            return Dispatch::Skip;
        }

        let mut ready = true;
        let mut blocked_by = None;
        let mut outputs = Map::new();
        for dependency in &task.dependencies {
            match state.tasks.get(dependency).map(|d| (d.status, &d.result)) {
                Some((TaskStatus::Completed, result)) => {
                    outputs.insert(dependency.clone(), result.clone().unwrap_or(Value::Null));
                }
                Some((TaskStatus::Failed | TaskStatus::Cancelled, _)) | None => {
                    blocked_by = Some(dependency.clone());
                    break;
                }
                Some(_) => ready = false,
            }
        }

        if let Some(blocker) = blocked_by {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.error = Some(format!("dependency {} did not complete", blocker));
                task.finish(TaskStatus::Cancelled);
            }
            state.metrics.tasks_cancelled += 1;
            state.cancel_dependents(task_id);
            tracing::warn!("Cancelled task {}: dependency {} did not complete", task_id, blocker);
            return Dispatch::Skip;
        }

        let Some(task) = state.tasks.get_mut(task_id) else {
            return Dispatch::Skip;
        };

        if !ready {
            task.requeue_count += 1;
            let timeout = task.timeout();
            tracing::debug!(
                "Task {} waiting on dependencies (requeue {})",
                task_id,
                task.requeue_count
            );
            state.metrics.requeues += 1;
            return Dispatch::Requeue(timeout);
        }

        task.status = TaskStatus::Running;
        task.started_at = Some(now_millis());
        if !outputs.is_empty() {
            match &mut task.payload {
                Value::Object(payload) => {
                    payload.insert("dependency_results".to_string(), Value::Object(outputs));
                }
                other => {
                    let input = other.take();
                    *other = json!({ "input": input, "dependency_results": outputs });
                }
            }
        }
        Dispatch::Run(task.clone())
    }

    async fn process_task(self: &Arc<Self>, task_id: &str) {
        let task = match self.begin(task_id) {
            Dispatch::Skip => return,
            Dispatch::Requeue(timeout) => {
                self.schedule(task_id, timeout, self.config.requeue_delay());
                return;
            }
            Dispatch::Run(task) => task,
        };
        self.changed.notify_waiters();

        let Some(agent) = self.agent(&task.agent) else {
            let error = OrchestratorError::AgentNotFound(task.agent.clone());
            self.fail_attempt(task_id, error.to_string(), false);
            return;
        };

        tracing::info!(
            "Running task {} ({}) on {} (attempt {})",
            task_id,
            task.task_type,
            task.agent,
            task.retry_count + 1
        );

        match agent.execute(&task).await {
            Ok(result) => self.complete(task_id, result),
            Err(e) => {
                tracing::warn!("Task {} attempt failed: {}", task_id, e);
                self.fail_attempt(task_id, e.to_string(), true);
            }
        }
    }

    fn complete(&self, task_id: &str, result: Value) {
        {
            let mut state = self.state();
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if task.status != TaskStatus::Running {
                return;
            }
            task.result = Some(result);
            task.error = None;
            task.finish(TaskStatus::Completed);
            state.metrics.tasks_completed += 1;
        }
        tracing::info!("Task {} completed", task_id);
        self.changed.notify_waiters();
    }

    /// Retry the task or, once attempts are exhausted, fail it for good
    fn fail_attempt(self: &Arc<Self>, task_id: &str, error: String, retryable: bool) {
        let retry = {
            let mut state = self.state();
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if task.status != TaskStatus::Running {
                return;
            }

            if retryable && task.retry_count < task.max_retries {
                task.retry_count += 1;
                task.status = TaskStatus::Pending;
                task.error = Some(error);
                let timeout = task.timeout();
                state.metrics.retries += 1;
                Some(timeout)
            } else {
                let final_error = if retryable {
                    OrchestratorError::TaskRetryExhausted {
                        task_id: task_id.to_string(),
                        attempts: task.retry_count + 1,
                        last_error: error,
                    }
                    .to_string()
                } else {
                    error
                };
                tracing::error!("{}", final_error);
                task.error = Some(final_error);
                task.finish(TaskStatus::Failed);
                state.metrics.tasks_failed += 1;
                state.cancel_dependents(task_id);
                None
            }
        };

        if let Some(timeout) = retry {
            self.schedule(task_id, timeout, self.config.retry_delay());
        }
        self.changed.notify_waiters();
    }

    fn timed_out(self: &Arc<Self>, task_id: &str) {
        let limit = {
            let mut state = self.state();
            let limit = match state.tasks.get(task_id) {
                Some(task) if task.status == TaskStatus::Running => task.timeout(),
                _ => return,
            };
            state.metrics.timeouts += 1;
            limit
        };
        let error = OrchestratorError::Timeout(format!("task {} exceeded {:?}", task_id, limit));
        self.fail_attempt(task_id, error.to_string(), true);
    }
}

struct TaskHandler {
    inner: Weak<Inner>,
}

impl TaskHandler {
    fn task_id(job: &Job) -> Option<&str> {
        let id = job.payload.get("task_id").and_then(Value::as_str);
        if id.is_none() {
            tracing::warn!("Job {} has no task_id", job.id);
        }
        id
    }
}

#[async_trait]
impl JobHandler for TaskHandler {
    async fn handle(&self, job: Job) {
        let (Some(inner), Some(task_id)) = (self.inner.upgrade(), Self::task_id(&job)) else {
            return;
        };
        inner.process_task(task_id).await;
    }

    async fn on_timeout(&self, job: Job) {
        if let (Some(inner), Some(task_id)) = (self.inner.upgrade(), Self::task_id(&job)) {
            inner.timed_out(task_id);
        }
    }
}

fn require_org(org_id: &str) -> Result<(), OrchestratorError> {
    if is_valid_org_id(org_id) {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidContext("org_id is required".to_string()))
    }
}

/// Runs workflows of agent tasks with dependencies, retries and timeouts
///
/// The orchestrator owns its agent and workflow registries and its task
/// table. Clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use chronicle_orchestrator::{Orchestrator, OrchestratorConfig, Workflow, WorkflowStep, WorkflowTrigger};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::in_memory(OrchestratorConfig::default())?;
///     // orchestrator.register_agent(...) for "taxonomy" and "provenance"
///     orchestrator.register_workflow(
///         Workflow::new("ingest", "Ingest file", vec![
///             WorkflowStep::new("taxonomy", "classify"),
///             WorkflowStep::new("provenance", "record"),
///         ])
///         .triggered_by(WorkflowTrigger::on("file.created")),
///     );
///     orchestrator.start().await?;
///
///     let started = orchestrator
///         .handle_event("file.created", json!({ "org_id": "o1", "file_id": "f1" }))
///         .await?;
///     println!("Started {} executions", started.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator dispatching on `queue`
    pub fn new(queue: Arc<dyn JobQueue>, config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                queue,
                config,
                agents: RwLock::new(HashMap::new()),
                workflows: RwLock::new(HashMap::new()),
                state: Mutex::new(State::default()),
                changed: Notify::new(),
            }),
        })
    }

    /// Create an orchestrator with its own [`InMemoryJobQueue`]
    pub fn in_memory(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        Self::new(Arc::new(InMemoryJobQueue::new()), config)
    }

    /// Configuration in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Register the task worker on the configured queue
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let handler = Arc::new(TaskHandler {
            inner: Arc::downgrade(&self.inner),
        });
        self.inner
            .queue
            .register_worker(
                &self.inner.config.queue_name,
                handler,
                WorkerOptions {
                    concurrency: self.inner.config.concurrency,
                },
            )
            .await
    }

    /// Register an agent under its name, replacing any previous one
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        tracing::debug!("Registered agent {}", name);
        self.inner
            .agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, agent);
    }

    /// Register a workflow, replacing one with the same id
    pub fn register_workflow(&self, workflow: Workflow) {
        tracing::debug!("Registered workflow {} ({} steps)", workflow.id, workflow.steps.len());
        self.inner
            .workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(workflow.id.clone(), workflow);
    }

    /// Look up a workflow
    pub fn workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.inner
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(workflow_id)
            .cloned()
    }

    /// Turn event triggering of a workflow on or off
    pub fn set_workflow_enabled(&self, workflow_id: &str, enabled: bool) -> Result<(), OrchestratorError> {
        let mut workflows = self.inner.workflows.write().unwrap_or_else(PoisonError::into_inner);
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;
        workflow.enabled = enabled;
        Ok(())
    }

    fn require_agent(&self, name: &str) -> Result<(), OrchestratorError> {
        self.inner
            .agent(name)
            .map(|_| ())
            .ok_or_else(|| OrchestratorError::AgentNotFound(name.to_string()))
    }

    /// Queue a single task; its dependencies must already be known
    pub async fn submit_task(&self, task: Task) -> Result<String, OrchestratorError> {
        require_org(&task.org_id)?;
        self.require_agent(&task.agent)?;

        let (id, timeout) = (task.id.clone(), task.timeout());
        {
            let mut state = self.inner.state();
            if let Some(missing) = task.dependencies.iter().find(|d| !state.tasks.contains_key(*d)) {
                return Err(OrchestratorError::TaskNotFound(missing.clone()));
            }
            state.tasks.insert(id.clone(), task);
            state.metrics.tasks_submitted += 1;
        }

        self.inner.enqueue(&id, timeout).await?;
        tracing::info!("Submitted task {}", id);
        Ok(id)
    }

    /// Start a workflow, returning the execution id
    ///
    /// Each step whose condition holds becomes one task depending on the task
    /// of the last step that was not skipped.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: Value,
        org_id: &str,
        user_id: &str,
    ) -> Result<String, OrchestratorError> {
        require_org(org_id)?;
        let workflow = self
            .workflow(workflow_id)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;

        let config = &self.inner.config;
        let mut execution = WorkflowExecution::new(workflow_id, org_id, user_id);
        let mut tasks = Vec::new();
        let mut previous: Option<String> = None;

        for (index, step) in workflow.steps.iter().enumerate() {
            if !step.applies_to(&context) {
                tracing::debug!("Skipping step {} of {} ({})", index, workflow_id, step.operation);
                execution.skipped_steps.push(index);
                continue;
            }
            self.require_agent(&step.agent)?;

            let mut task = Task::new(&step.operation, &step.agent, context.clone(), org_id, user_id)
                .with_dependencies(previous.take().into_iter().collect())
                .with_max_retries(step.max_retries.unwrap_or(config.default_max_retries))
                .with_timeout(step.timeout.unwrap_or_else(|| config.default_step_timeout()));
            task.execution_id = Some(execution.id.clone());

            previous = Some(task.id.clone());
            execution.task_ids.push(task.id.clone());
            tasks.push(task);
        }

        let execution_id = execution.id.clone();
        let queued: Vec<(String, Duration)> = tasks.iter().map(|t| (t.id.clone(), t.timeout())).collect();
        {
            let mut state = self.inner.state();
            state.metrics.tasks_submitted += tasks.len();
            state.metrics.executions_started += 1;
            for task in tasks {
                state.tasks.insert(task.id.clone(), task);
            }
            state.executions.insert(execution_id.clone(), execution);
        }

        for (task_id, timeout) in &queued {
            self.inner.enqueue(task_id, *timeout).await?;
        }

        tracing::info!(
            "Started workflow {} as {} ({} tasks) for {}",
            workflow_id,
            execution_id,
            queued.len(),
            org_id
        );
        Ok(execution_id)
    }

    /// Start every enabled workflow triggered by an event
    ///
    /// The event data must carry `org_id`; `user_id` defaults to `system`.
    /// Returns the execution ids, ordered by workflow id.
    pub async fn handle_event(&self, event_type: &str, data: Value) -> Result<Vec<String>, OrchestratorError> {
        let mut triggered: Vec<String> = self
            .inner
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|w| w.is_triggered_by(event_type, &data))
            .map(|w| w.id.clone())
            .collect();
        triggered.sort();

        if triggered.is_empty() {
            tracing::debug!("No workflow triggered by {}", event_type);
            return Ok(Vec::new());
        }

        let org_id = data
            .get("org_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let user_id = data
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or("system")
            .to_string();

        let mut executions = Vec::with_capacity(triggered.len());
        for workflow_id in triggered {
            let execution_id = self
                .execute_workflow(&workflow_id, data.clone(), &org_id, &user_id)
                .await?;
            executions.push(execution_id);
        }

        tracing::info!("Event {} started {} workflows", event_type, executions.len());
        Ok(executions)
    }

    /// Cancel a pending task and everything waiting on it
    ///
    /// Returns false when the task is already running or finished.
    pub fn cancel_task(&self, task_id: &str) -> Result<bool, OrchestratorError> {
        {
            let mut state = self.inner.state();
            let task = state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
            if task.status != TaskStatus::Pending {
                return Ok(false);
            }
            task.error = Some("cancelled".to_string());
            task.finish(TaskStatus::Cancelled);
            state.metrics.tasks_cancelled += 1;
            state.cancel_dependents(task_id);
        }

        tracing::info!("Cancelled task {}", task_id);
        self.inner.changed.notify_waiters();
        Ok(true)
    }

    /// Snapshot of a task
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.inner.state().tasks.get(task_id).cloned()
    }

    /// Snapshot of a workflow execution
    pub fn execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.inner.state().executions.get(execution_id).cloned()
    }

    /// Tasks of an execution, in step order
    pub fn execution_tasks(&self, execution_id: &str) -> Result<Vec<Task>, OrchestratorError> {
        let state = self.inner.state();
        let execution = state
            .executions
            .get(execution_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(format!("execution {}", execution_id)))?;
        Ok(execution
            .task_ids
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }

    /// Current state of an execution
    pub fn execution_status(&self, execution_id: &str) -> Result<ExecutionStatus, OrchestratorError> {
        self.inner.state().execution_status(execution_id)
    }

    /// Counters since start
    pub fn metrics(&self) -> OrchestratorMetrics {
        self.inner.state().metrics.clone()
    }

    /// Wait until `check` yields a value or `timeout` elapses
    async fn wait_until<T>(
        &self,
        timeout: Duration,
        what: &str,
        check: impl Fn(&State) -> Result<Option<T>, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = check(&self.inner.state())?;
            if let Some(value) = ready {
                return Ok(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(OrchestratorError::Timeout(format!("waiting for {}", what)));
            }
        }
    }

    /// Wait for every task of an execution to reach a terminal state
    pub async fn wait_for_execution(
        &self,
        execution_id: &str,
        timeout: Duration,
    ) -> Result<ExecutionStatus, OrchestratorError> {
        self.wait_until(timeout, execution_id, |state| {
            let status = state.execution_status(execution_id)?;
            Ok(status.is_terminal().then_some(status))
        })
        .await
    }

    /// Wait for a task to reach a terminal state
    pub async fn wait_for_task(&self, task_id: &str, timeout: Duration) -> Result<Task, OrchestratorError> {
        self.wait_until(timeout, task_id, |state| {
            let task = state
                .tasks
                .get(task_id)
                .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
            Ok(task.status.is_terminal().then(|| task.clone()))
        })
        .await
    }
}
