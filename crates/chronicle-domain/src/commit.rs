//! Commits and actions - the "who changed what, why, when" records

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Branch used when a commit does not name one
pub const DEFAULT_BRANCH: &str = "main";

/// Kind of principal that authored a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    /// A human user
    User,
    /// An automated agent acting on behalf of a user
    Agent,
    /// The system itself (sweeps, repairs)
    System,
}

impl AuthorType {
    /// Get the author type as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorType::User => "user",
            AuthorType::Agent => "agent",
            AuthorType::System => "system",
        }
    }

    /// Parse an author type from its stored form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(AuthorType::User),
            "agent" => Some(AuthorType::Agent),
            "system" => Some(AuthorType::System),
            _ => None,
        }
    }
}

/// An immutable record of a change set
///
/// A commit is written before any action or version it covers. The only
/// mutation it ever sees is attaching its signature right after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Unique identifier (UUID)
    pub id: String,

    /// Owning organisation
    pub org_id: String,

    /// Human readable description of the change
    pub message: String,

    /// Author identifier
    pub author: String,

    /// Kind of author
    pub author_type: AuthorType,

    /// Creation time (ms since Unix epoch)
    pub created_at: Timestamp,

    /// Previous commit on the same branch, if any
    pub parent_commit_id: Option<String>,

    /// Branch name (defaults to `main`)
    pub branch_name: String,

    /// Hex signature over the canonical content; `None` until attached
    pub signature: Option<String>,

    /// Opaque metadata passed through verbatim
    pub metadata: Value,
}

/// Input for creating a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInput {
    /// Owning organisation (must be non-blank)
    pub org_id: String,
    /// Commit message
    pub message: String,
    /// Author identifier
    pub author: String,
    /// Kind of author
    pub author_type: AuthorType,
    /// Explicit parent commit
    #[serde(default)]
    pub parent_commit_id: Option<String>,
    /// Branch name; `None` means `main`
    #[serde(default)]
    pub branch_name: Option<String>,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl CommitInput {
    /// Create a commit input on the default branch
    pub fn new(
        org_id: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
        author_type: AuthorType,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            message: message.into(),
            author: author.into(),
            author_type,
            parent_commit_id: None,
            branch_name: None,
            metadata: None,
        }
    }

    /// Set the parent commit
    pub fn with_parent(mut self, parent_commit_id: impl Into<String>) -> Self {
        self.parent_commit_id = Some(parent_commit_id.into());
        self
    }

    /// Set the branch
    pub fn on_branch(mut self, branch_name: impl Into<String>) -> Self {
        self.branch_name = Some(branch_name.into());
        self
    }

    /// Attach opaque metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Branch this commit lands on
    pub fn branch(&self) -> &str {
        self.branch_name.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

/// Outcome of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The operation succeeded
    Success,
    /// The operation failed; see the error message
    Failed,
}

impl ActionStatus {
    /// Get the status as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
        }
    }

    /// Parse a status from its stored form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ActionStatus::Success),
            "failed" => Some(ActionStatus::Failed),
            _ => None,
        }
    }
}

/// One operation performed within a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier
    pub id: String,
    /// Owning commit
    pub commit_id: String,
    /// Free-form tag, e.g. `CREATE_PROJECT`, `CLASSIFY_FILE`
    pub action_type: String,
    /// Subsystem that performed the action
    pub tool: String,
    /// Type of the affected entity
    pub entity_type: String,
    /// Id of the affected entity
    pub entity_id: String,
    /// Input snapshot
    pub inputs: Value,
    /// Output snapshot
    pub outputs: Value,
    /// Outcome
    pub status: ActionStatus,
    /// Error detail for failed actions
    pub error_message: Option<String>,
    /// Creation time (ms since Unix epoch)
    pub created_at: Timestamp,
}

/// Input for recording an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInput {
    /// Free-form tag
    pub action_type: String,
    /// Subsystem name
    pub tool: String,
    /// Type of the affected entity
    pub entity_type: String,
    /// Id of the affected entity
    pub entity_id: String,
    /// Input snapshot
    #[serde(default)]
    pub inputs: Value,
    /// Output snapshot
    #[serde(default)]
    pub outputs: Value,
    /// Outcome
    pub status: ActionStatus,
    /// Error detail
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ActionInput {
    /// A successful action with empty snapshots
    pub fn success(
        action_type: impl Into<String>,
        tool: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            tool: tool.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            inputs: Value::Null,
            outputs: Value::Null,
            status: ActionStatus::Success,
            error_message: None,
        }
    }

    /// Attach the input snapshot
    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    /// Attach the output snapshot
    pub fn with_outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }

    /// Mark the action as failed
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.status = ActionStatus::Failed;
        self.error_message = Some(error_message.into());
        self
    }
}
