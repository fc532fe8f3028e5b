//! Chronicle Task Orchestrator
//!
//! Sequences multi-step agent workflows on top of a job queue.
//!
//! # Overview
//!
//! - **Workflows** are ordered steps; a step whose condition is false is skipped
//! - **Tasks** are created one per executed step and chained: each depends on
//!   the task of the previous executed step
//! - **Dispatch** only happens once every dependency has completed; a task
//!   checked too early is requeued
//! - **Retries** requeue a failed task up to `max_retries` times; the next
//!   failure fails the task and its dependents are cancelled
//! - **Timeouts** are enforced by the [`JobQueue`], which reports them back
//!
//! Workflows start explicitly with [`Orchestrator::execute_workflow`] or from
//! events with [`Orchestrator::handle_event`].

#![warn(missing_docs)]

mod agent;
mod config;
mod error;
mod metrics;
mod orchestrator;
mod queue;
mod task;
mod workflow;

pub use agent::Agent;
pub use config::OrchestratorConfig;
pub use error::{AgentError, OrchestratorError};
pub use metrics::OrchestratorMetrics;
pub use orchestrator::Orchestrator;
pub use queue::{InMemoryJobQueue, Job, JobHandler, JobOptions, JobQueue, WorkerOptions};
pub use task::{Task, TaskStatus};
pub use workflow::{
    ExecutionStatus, StepCondition, Workflow, WorkflowExecution, WorkflowStep, WorkflowTrigger,
};
