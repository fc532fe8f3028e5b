//! Entity versions - immutable, timestamped snapshots

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of an entity's properties valid over `[valid_from, valid_to)`
///
/// At most one version per entity has `valid_to == None`: the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    /// Unique identifier
    pub id: String,
    /// Versioned entity
    pub entity_id: String,
    /// Type of the versioned entity
    pub entity_type: String,
    /// Property snapshot
    pub properties: Value,
    /// Start of validity (inclusive)
    pub valid_from: Timestamp,
    /// End of validity (exclusive); `None` while current
    pub valid_to: Option<Timestamp>,
    /// Commit that created this version
    pub created_by_commit: String,
    /// Commit that closed this version
    pub ended_by_commit: Option<String>,
    /// Owning organisation
    pub org_id: String,
    /// Hash of the canonical property JSON
    pub content_hash: String,
}

impl EntityVersion {
    /// Whether this is the currently active version
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether the version was active at `timestamp`
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.valid_from <= timestamp && self.valid_to.is_none_or(|to| timestamp < to)
    }
}
