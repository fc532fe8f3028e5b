//! Edge facts - bitemporal relationships between entities

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed relationship that carries validity and provenance
///
/// Unlike a plain graph edge, an edge fact is never deleted: it is ended by
/// setting `valid_to` and linking the commit that ended it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeFact {
    /// Unique identifier
    pub id: String,
    /// Relationship name, e.g. `CLASSIFIED_AS`, `SCHEDULED_ON`, `FOR_SCENE`
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Source entity
    pub from_id: String,
    /// Target entity
    pub to_id: String,
    /// Denormalized source type tag
    pub from_type: Option<String>,
    /// Denormalized target type tag
    pub to_type: Option<String>,
    /// Start of validity (inclusive)
    pub valid_from: Timestamp,
    /// End of validity (exclusive); `None` while active
    pub valid_to: Option<Timestamp>,
    /// Commit that created the fact
    pub created_by_commit: String,
    /// Commit that ended the fact
    pub ended_by_commit: Option<String>,
    /// Owning organisation
    pub org_id: String,
    /// Free-form properties (confidence, method, rule id, ...)
    pub props: Value,
}

impl EdgeFact {
    /// Whether the fact is still active
    pub fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// Input for creating an edge fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeFactInput {
    /// Relationship name
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Source entity
    pub from_id: String,
    /// Target entity
    pub to_id: String,
    /// Source type tag
    #[serde(default)]
    pub from_type: Option<String>,
    /// Target type tag
    #[serde(default)]
    pub to_type: Option<String>,
    /// Free-form properties
    #[serde(default)]
    pub props: Value,
}

impl EdgeFactInput {
    /// Create an input with empty properties
    pub fn new(
        edge_type: impl Into<String>,
        from_id: impl Into<String>,
        to_id: impl Into<String>,
    ) -> Self {
        Self {
            edge_type: edge_type.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            from_type: None,
            to_type: None,
            props: Value::Object(Default::default()),
        }
    }

    /// Attach properties
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Attach denormalized endpoint types
    pub fn with_types(mut self, from_type: impl Into<String>, to_type: impl Into<String>) -> Self {
        self.from_type = Some(from_type.into());
        self.to_type = Some(to_type.into());
        self
    }
}
