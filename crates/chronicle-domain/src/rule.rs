//! Cross-layer consistency rules
//!
//! Rules are plain data: a compiled validation query that returns violating
//! entities, and an optional repair plan run once per violation.

use crate::{Cardinality, Layer};
use serde::{Deserialize, Serialize};

/// Statements executed, in one transaction, to repair a single violation
///
/// Every statement sees the parameters `entity_id`, `org_id`, `rule_id`,
/// `repair_id`, `link_id`, `commit_id` and `now`, where `commit_id` is the
/// system commit the repair is recorded under. The final statement's rows decide the
/// outcome: a non-empty result means the repair happened, and its
/// `repair_action` column labels what was done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    /// Statements in execution order
    pub statements: Vec<String>,
}

impl RepairPlan {
    /// A repair consisting of a single statement
    pub fn single(statement: impl Into<String>) -> Self {
        Self {
            statements: vec![statement.into()],
        }
    }

    /// A repair made of several statements
    pub fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }
}

/// A declarative constraint between two layers of the domain model
///
/// The validation query must project `entity_id`, `entity_type` and `org_id`
/// columns, and may project `violation_type` and `description`. It is written
/// without tenant awareness; the engine adds the organisation filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossLayerRule {
    /// Stable rule identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Layer of the source entity
    pub from_layer: Layer,
    /// Type of the source entity
    pub from_entity_type: String,
    /// Layer of the target entity
    pub to_layer: Layer,
    /// Type of the target entity
    pub to_entity_type: String,
    /// Relationship that must exist
    pub relationship_type: String,
    /// Whether the link is mandatory
    pub required: bool,
    /// Relationship cardinality
    pub cardinality: Cardinality,
    /// Query returning violating entities
    pub validation_query: String,
    /// Optional automated repair
    #[serde(default)]
    pub repair: Option<RepairPlan>,
    /// Disabled rules are skipped by sweeps
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CrossLayerRule {
    /// Whether the rule can repair what it finds
    pub fn has_repair(&self) -> bool {
        self.repair
            .as_ref()
            .is_some_and(|plan| !plan.statements.is_empty())
    }

    /// Short `from -> to` description for logs
    pub fn describe(&self) -> String {
        format!(
            "{}:{} -[{}]-> {}:{}",
            self.from_layer,
            self.from_entity_type,
            self.relationship_type,
            self.to_layer,
            self.to_entity_type
        )
    }
}
