//! Cross-layer validation and repair
//!
//! A run walks the enabled rules in registration order:
//!
//! ```text
//! Idle -> Validating(i) -> Repairing(i) -> Validating(i + 1) -> ... -> Idle
//! ```
//!
//! Repairs are idempotent: each one creates the missing link, and the
//! validation queries exclude linked entities, so a second run over an
//! unchanged graph finds nothing to repair.
//!
//! Repairs of one rule are recorded under one system commit, bound into the
//! repair plan as `commit_id`, with a `REPAIR_CROSS_LAYER` action for every
//! repaired entity. A rule with nothing to repair opens no commit.

use crate::{EngineConfig, EngineError, EngineMetrics, RuleRegistry};
use chronicle_domain::{
    is_valid_org_id, new_id, now_millis, params, AccessMode, ActionInput, AuthorType, CommitInput,
    CrossLayerRule, EdgeFactInput, GraphStore, Layer, Params, Record, RecordExt, RecordSet,
    Statement, TxOutcome,
};
use chronicle_ledger::{LedgerError, ProvenanceLedger, ValidationEvent, ENGINE_AUTHOR};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Instant;

const SELECT_ENTITY: &str = "SELECT id, label FROM nodes WHERE id = :id AND org_id = :org_id";

const COUNT_ENTITIES: &str = "SELECT COUNT(*) AS n FROM nodes WHERE label = :label AND org_id = :org_id";

const INSERT_EDGE: &str = "INSERT INTO edges (id, type, from_id, to_id, org_id, properties, created_at)
    VALUES (:id, :type, :from_id, :to_id, :org_id, :properties, :now)
    RETURNING id";

const INSERT_EDGE_IN_COMMIT: &str = "INSERT INTO edges (id, type, from_id, to_id, org_id, properties, created_by_commit, created_at)
    SELECT :id, :type, :from_id, :to_id, c.org_id, :properties, c.id, :now
    FROM commits c WHERE c.id = :commit_id AND c.org_id = :org_id
    RETURNING id";

const REPAIR_ACTION: &str = "REPAIR_CROSS_LAYER";

/// Where the engine is in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No run in progress
    Idle,
    /// Running the validation query of the i-th enabled rule
    Validating(usize),
    /// Repairing violations of the i-th enabled rule
    Repairing(usize),
}

/// One entity that breaks a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Offending entity
    pub entity_id: String,
    /// Its type
    pub entity_type: String,
    /// Machine-readable kind of violation
    pub violation_type: String,
    /// Human-readable explanation
    pub description: String,
}

/// What happened when a violation was repaired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// The repair ran and reported what it did
    Repaired {
        /// Repaired entity
        entity_id: String,
        /// Label returned by the repair
        repair_action: String,
    },
    /// The repair ran but changed nothing; it was rolled back
    Unchanged {
        /// Entity that is still in violation
        entity_id: String,
    },
    /// The repair failed; logged and reported, never propagated
    Failed {
        /// Entity that is still in violation
        entity_id: String,
        /// Failure message
        error: String,
    },
}

impl RepairOutcome {
    /// Whether the violation was repaired
    pub fn is_repaired(&self) -> bool {
        matches!(self, RepairOutcome::Repaired { .. })
    }

    /// Entity the outcome is about
    pub fn entity_id(&self) -> &str {
        match self {
            RepairOutcome::Repaired { entity_id, .. }
            | RepairOutcome::Unchanged { entity_id }
            | RepairOutcome::Failed { entity_id, .. } => entity_id,
        }
    }
}

/// Result of validating one rule for one organisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleValidationResult {
    /// Rule evaluated
    pub rule_id: String,
    /// Entities of the rule's source type in the organisation
    pub entities_checked: usize,
    /// Entities in violation
    pub violations: Vec<Violation>,
    /// Repairs attempted, one per violation when repair ran
    pub repairs: Vec<RepairOutcome>,
}

impl RuleValidationResult {
    /// Violations found
    pub fn violations_found(&self) -> usize {
        self.violations.len()
    }

    /// Violations repaired
    pub fn violations_repaired(&self) -> usize {
        self.repairs.iter().filter(|r| r.is_repaired()).count()
    }

    /// Whether the rule held for every entity
    pub fn is_satisfied(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Request to link two entities across layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossLayerLinkRequest {
    /// Source entity
    pub from_id: String,
    /// Target entity
    pub to_id: String,
    /// Layer of the source
    pub from_layer: Layer,
    /// Layer of the target
    pub to_layer: Layer,
    /// Relationship type
    pub relationship_type: String,
    /// How the link was established (`manual`, `auto_repair`, `classifier`, ...)
    pub method: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Record an edge fact (with validity and provenance) instead of a plain edge
    #[serde(default = "default_temporal")]
    pub temporal: bool,
    /// User the link is attributed to
    pub user_id: String,
}

fn default_temporal() -> bool {
    true
}

fn require_org(org_id: &str) -> Result<(), EngineError> {
    if is_valid_org_id(org_id) {
        Ok(())
    } else {
        Err(EngineError::InvalidContext("org_id is required".to_string()))
    }
}

/// Restrict a rule's query to one organisation, optionally to some entities
fn scoped_query(validation_query: &str, entity_count: usize) -> String {
    let mut query = format!(
        "SELECT * FROM ({}) AS violation WHERE violation.org_id = :org_id",
        validation_query
    );
    if entity_count > 0 {
        let placeholders: Vec<String> = (0..entity_count).map(|i| format!(":e{}", i)).collect();
        query.push_str(&format!(" AND violation.entity_id IN ({})", placeholders.join(", ")));
    }
    query
}

fn violation_from_record(rule: &CrossLayerRule, record: &Record) -> Option<Violation> {
    let entity_id = record.str_field("entity_id")?;
    Some(Violation {
        entity_id: entity_id.to_string(),
        entity_type: record
            .str_field("entity_type")
            .unwrap_or(&rule.from_entity_type)
            .to_string(),
        violation_type: record
            .str_field("violation_type")
            .unwrap_or("MISSING_RELATIONSHIP")
            .to_string(),
        description: record
            .str_field("description")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} violates {}", entity_id, rule.describe())),
    })
}

/// Validates cross-layer rules and repairs what it can
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use chronicle_crosslayer::{CrossLayerEngine, EngineConfig};
/// use chronicle_ledger::{LedgerConfig, ProvenanceLedger};
/// use chronicle_store::SqliteGraphStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(SqliteGraphStore::new("chronicle.db")?);
/// let ledger = ProvenanceLedger::from_config(store, LedgerConfig::from_file("ledger.toml")?);
/// let mut engine = CrossLayerEngine::with_builtin_rules(ledger, EngineConfig::default());
///
/// for result in engine.validate_all_cross_layer_links("org-1")? {
///     println!("{}: {} found, {} repaired", result.rule_id, result.violations_found(), result.violations_repaired());
/// }
/// # Ok(())
/// # }
/// ```
pub struct CrossLayerEngine<S> {
    ledger: ProvenanceLedger<S>,
    registry: RuleRegistry,
    config: EngineConfig,
    metrics: EngineMetrics,
    state: EngineState,
}

impl<S: GraphStore> CrossLayerEngine<S> {
    /// Create an engine over `registry`
    ///
    /// Rules named in `config.disabled_rules` are switched off; unknown names
    /// are logged and ignored.
    pub fn new(ledger: ProvenanceLedger<S>, mut registry: RuleRegistry, config: EngineConfig) -> Self {
        for rule_id in &config.disabled_rules {
            if registry.disable(rule_id).is_err() {
                tracing::warn!("Cannot disable unknown rule {}", rule_id);
            }
        }
        Self {
            ledger,
            registry,
            config,
            metrics: EngineMetrics::new(),
            state: EngineState::Idle,
        }
    }

    /// Create an engine with the built-in rules registered
    pub fn with_builtin_rules(ledger: ProvenanceLedger<S>, config: EngineConfig) -> Self {
        Self::new(ledger, RuleRegistry::from_rules(crate::builtin_rules()), config)
    }

    /// Current run state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Registered rules
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Registered rules, for toggling
    pub fn registry_mut(&mut self) -> &mut RuleRegistry {
        &mut self.registry
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Metrics accumulated across runs
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// The ledger provenance is recorded through
    pub fn ledger(&self) -> &ProvenanceLedger<S> {
        &self.ledger
    }

    fn read(&self, query: &str, params: Params, org_id: &str) -> Result<RecordSet, EngineError> {
        self.ledger
            .store()
            .run(query, params, AccessMode::Read, Some(org_id))
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    /// Validate every enabled rule and record the sweep as one validation event
    pub fn validate_all_cross_layer_links(
        &mut self,
        org_id: &str,
    ) -> Result<Vec<RuleValidationResult>, EngineError> {
        require_org(org_id)?;
        let started = Instant::now();
        let rules: Vec<CrossLayerRule> = self.registry.enabled().cloned().collect();

        tracing::info!("Validating {} cross-layer rules for {}", rules.len(), org_id);

        let outcome = self.run_rules(org_id, &rules, &[], self.config.auto_repair);
        self.state = EngineState::Idle;
        let results = outcome?;

        let event = ValidationEvent {
            org_id: org_id.to_string(),
            rules_checked: results.len(),
            entities_validated: results.iter().map(|r| r.entities_checked).sum(),
            violations_found: results.iter().map(|r| r.violations_found()).sum(),
            violations_repaired: results.iter().map(|r| r.violations_repaired()).sum(),
        };
        self.ledger.record_validation_event(&event)?;
        self.metrics.record_run(started.elapsed().as_millis() as u64);

        tracing::info!(
            "Validation of {} complete: {} entities, {} violations, {} repaired",
            org_id,
            event.entities_validated,
            event.violations_found,
            event.violations_repaired
        );
        Ok(results)
    }

    /// Validate a single rule, repairing violations when auto-repair is on
    pub fn validate_rule(
        &mut self,
        org_id: &str,
        rule: &CrossLayerRule,
    ) -> Result<RuleValidationResult, EngineError> {
        require_org(org_id)?;
        let outcome = self.check_rule(0, org_id, rule, &[], self.config.auto_repair);
        self.state = EngineState::Idle;
        outcome
    }

    /// Validate a registered rule by id
    pub fn validate_rule_by_id(
        &mut self,
        org_id: &str,
        rule_id: &str,
    ) -> Result<RuleValidationResult, EngineError> {
        let rule = self
            .registry
            .get(rule_id)
            .cloned()
            .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;
        self.validate_rule(org_id, &rule)
    }

    /// Repair violations of specific entities across all enabled repairable rules
    ///
    /// Repairs run whether or not auto-repair is configured.
    pub fn repair_violations(
        &mut self,
        org_id: &str,
        entity_ids: &[String],
    ) -> Result<Vec<RepairOutcome>, EngineError> {
        require_org(org_id)?;
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rules: Vec<CrossLayerRule> = self
            .registry
            .enabled()
            .filter(|r| r.has_repair())
            .cloned()
            .collect();

        let outcome = self.run_rules(org_id, &rules, entity_ids, true);
        self.state = EngineState::Idle;

        Ok(outcome?.into_iter().flat_map(|r| r.repairs).collect())
    }

    fn run_rules(
        &mut self,
        org_id: &str,
        rules: &[CrossLayerRule],
        entity_ids: &[String],
        repair: bool,
    ) -> Result<Vec<RuleValidationResult>, EngineError> {
        rules
            .iter()
            .enumerate()
            .map(|(index, rule)| self.check_rule(index, org_id, rule, entity_ids, repair))
            .collect()
    }

    fn check_rule(
        &mut self,
        index: usize,
        org_id: &str,
        rule: &CrossLayerRule,
        entity_ids: &[String],
        repair: bool,
    ) -> Result<RuleValidationResult, EngineError> {
        self.state = EngineState::Validating(index);
        tracing::debug!("Validating rule {} ({})", rule.id, rule.describe());

        let mut params = Params::new();
        for (i, entity_id) in entity_ids.iter().enumerate() {
            params.insert(format!("e{}", i), json!(entity_id));
        }
        let records = self.read(&scoped_query(&rule.validation_query, entity_ids.len()), params, org_id)?;

        // A rule may report an entity more than once (one row per missing target)
        let mut seen = BTreeSet::new();
        let violations: Vec<Violation> = records
            .iter()
            .filter_map(|record| violation_from_record(rule, record))
            .filter(|v| seen.insert(v.entity_id.clone()))
            .collect();

        let entities_checked = self
            .read(COUNT_ENTITIES, params! { "label" => &rule.from_entity_type }, org_id)?
            .first()
            .and_then(|r| r.i64_field("n"))
            .map_or(0, |n| n as usize);

        self.metrics.record_found(&rule.id, violations.len());
        if !violations.is_empty() {
            tracing::info!("Rule {} found {} violations in {}", rule.id, violations.len(), org_id);
        }

        let mut repairs = Vec::new();
        if repair && rule.has_repair() && !violations.is_empty() {
            self.state = EngineState::Repairing(index);
            let commit_id = self.open_repair_commit(org_id, rule, violations.len())?;
            for violation in &violations {
                let outcome = self.repair_one(org_id, rule, &commit_id, violation);
                match &outcome {
                    RepairOutcome::Repaired { .. } => self.metrics.record_repaired(&rule.id),
                    RepairOutcome::Failed { .. } => self.metrics.record_failed(&rule.id),
                    RepairOutcome::Unchanged { .. } => {}
                }
                repairs.push(outcome);
            }
        }

        Ok(RuleValidationResult {
            rule_id: rule.id.clone(),
            entities_checked,
            violations,
            repairs,
        })
    }

    fn open_repair_commit(
        &self,
        org_id: &str,
        rule: &CrossLayerRule,
        violations: usize,
    ) -> Result<String, EngineError> {
        let commit_id = self.ledger.create_commit(
            CommitInput::new(
                org_id,
                format!("Cross-layer repair: {} ({} violations)", rule.id, violations),
                ENGINE_AUTHOR,
                AuthorType::System,
            )
            .on_branch(&self.ledger.config().system_branch)
            .with_metadata(json!({ "rule_id": rule.id, "violations": violations })),
        )?;
        Ok(commit_id)
    }

    fn repair_one(
        &self,
        org_id: &str,
        rule: &CrossLayerRule,
        commit_id: &str,
        violation: &Violation,
    ) -> RepairOutcome {
        let entity_id = violation.entity_id.as_str();
        let Some(plan) = &rule.repair else {
            return RepairOutcome::Unchanged {
                entity_id: entity_id.to_string(),
            };
        };

        let params = params! {
            "entity_id" => entity_id,
            "rule_id" => &rule.id,
            "repair_id" => new_id(),
            "link_id" => new_id(),
            "commit_id" => commit_id,
            "now" => now_millis(),
        };

        // The final statement guards the transaction: no rows, no changes
        let last = plan.statements.len().saturating_sub(1);
        let statements = plan
            .statements
            .iter()
            .enumerate()
            .map(|(i, sql)| {
                let statement = Statement::new(sql.as_str(), params.clone());
                if i == last {
                    statement.guard()
                } else {
                    statement
                }
            })
            .collect();

        match self.ledger.store().run_in_transaction(statements, Some(org_id)) {
            Ok(TxOutcome::Committed(results)) => {
                let row = results.last().and_then(|set| set.first());
                let repair_action = row
                    .and_then(|row| row.str_field("repair_action"))
                    .unwrap_or("repaired")
                    .to_string();
                tracing::info!("Repaired {} for rule {}: {}", entity_id, rule.id, repair_action);

                let action = ActionInput::success(REPAIR_ACTION, ENGINE_AUTHOR, &violation.entity_type, entity_id)
                    .with_inputs(json!({
                        "rule_id": rule.id,
                        "violation_type": violation.violation_type,
                    }))
                    .with_outputs(row.cloned().map_or(Value::Null, Value::Object));
                // The repair itself is committed; a missing action leaves the commit partial
                if let Err(e) = self.ledger.create_action(commit_id, action, org_id) {
                    tracing::error!("Repair of {} was not recorded in commit {}: {}", entity_id, commit_id, e);
                }
                RepairOutcome::Repaired {
                    entity_id: entity_id.to_string(),
                    repair_action,
                }
            }
            Ok(TxOutcome::Aborted { statement }) => {
                tracing::warn!(
                    "Repair of {} for rule {} changed nothing (statement {} matched no rows)",
                    entity_id,
                    rule.id,
                    statement
                );
                RepairOutcome::Unchanged {
                    entity_id: entity_id.to_string(),
                }
            }
            Err(e) => {
                tracing::error!("RepairFailed: {} for rule {}: {}", entity_id, rule.id, e);
                RepairOutcome::Failed {
                    entity_id: entity_id.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Link two existing entities across layers, returning the link id
    ///
    /// Temporal links are edge facts; when `commit_id` is given the fact is
    /// recorded in that commit, otherwise under a new one. Direct links are
    /// plain edges carrying the same metadata, attributed to `commit_id` when
    /// one is given. A given commit must exist in the organisation.
    pub fn create_cross_layer_link(
        &self,
        org_id: &str,
        request: &CrossLayerLinkRequest,
        commit_id: Option<&str>,
    ) -> Result<String, EngineError> {
        require_org(org_id)?;

        let from_label = self.entity_label(org_id, &request.from_id, "from")?;
        let to_label = self.entity_label(org_id, &request.to_id, "to")?;

        let metadata = json!({
            "from_layer": request.from_layer,
            "to_layer": request.to_layer,
            "method": request.method,
            "confidence": request.confidence,
        });

        let id = if request.temporal {
            let input = EdgeFactInput::new(&request.relationship_type, &request.from_id, &request.to_id)
                .with_types(from_label, to_label)
                .with_props(json!({ "metadata": metadata }));
            match commit_id {
                Some(commit_id) => self.ledger.record_edge_fact_in_commit(commit_id, org_id, &input)?,
                None => self.ledger.create_edge_fact(org_id, &request.user_id, input)?,
            }
        } else {
            let id = new_id();
            let mut params = params! {
                "id" => &id,
                "type" => &request.relationship_type,
                "from_id" => &request.from_id,
                "to_id" => &request.to_id,
                "properties" => metadata.to_string(),
                "now" => now_millis(),
            };
            let query = match commit_id {
                Some(commit_id) => {
                    params.insert("commit_id".to_string(), json!(commit_id));
                    INSERT_EDGE_IN_COMMIT
                }
                None => INSERT_EDGE,
            };
            let inserted = self
                .ledger
                .store()
                .run(query, params, AccessMode::Write, Some(org_id))
                .map_err(|e| EngineError::Store(e.to_string()))?;
            if inserted.is_empty() {
                return Err(match commit_id {
                    Some(commit_id) => EngineError::Ledger(LedgerError::CommitNotFound(commit_id.to_string())),
                    None => EngineError::Store(format!("edge {} was not inserted", id)),
                });
            }
            id
        };

        tracing::info!(
            "Linked {}:{} -[{}]-> {}:{} ({})",
            request.from_layer,
            request.from_id,
            request.relationship_type,
            request.to_layer,
            request.to_id,
            if request.temporal { "edge fact" } else { "edge" }
        );
        Ok(id)
    }

    fn entity_label(&self, org_id: &str, entity_id: &str, side: &str) -> Result<String, EngineError> {
        let records = self.read(SELECT_ENTITY, params! { "id" => entity_id }, org_id)?;
        records
            .first()
            .and_then(|r| r.str_field("label"))
            .map(str::to_string)
            .ok_or_else(|| EngineError::EntityNotFound(format!("{} entity {}", side, entity_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_query_filters_org() {
        let q = scoped_query("SELECT 1 AS entity_id, 'o1' AS org_id", 0);
        assert_eq!(
            q,
            "SELECT * FROM (SELECT 1 AS entity_id, 'o1' AS org_id) AS violation WHERE violation.org_id = :org_id"
        );
    }

    #[test]
    fn test_scoped_query_filters_entities() {
        let q = scoped_query("Q", 3);
        assert!(q.ends_with("AND violation.entity_id IN (:e0, :e1, :e2)"));
    }

    #[test]
    fn test_violation_defaults() {
        let rule = crate::builtin_rules().remove(1);
        let mut record = Record::new();
        record.insert("entity_id".into(), json!("s1"));

        let violation = violation_from_record(&rule, &record).unwrap();
        assert_eq!(violation.entity_type, "Shot");
        assert_eq!(violation.violation_type, "MISSING_RELATIONSHIP");
        assert!(violation.description.contains("FOR_SCENE"));

        assert!(violation_from_record(&rule, &Record::new()).is_none());
    }

    #[test]
    fn test_result_counts() {
        let result = RuleValidationResult {
            rule_id: "r".to_string(),
            entities_checked: 3,
            violations: vec![],
            repairs: vec![
                RepairOutcome::Repaired {
                    entity_id: "a".to_string(),
                    repair_action: "created_cluster".to_string(),
                },
                RepairOutcome::Failed {
                    entity_id: "b".to_string(),
                    error: "x".to_string(),
                },
            ],
        };
        assert_eq!(result.violations_repaired(), 1);
        assert!(result.is_satisfied());
        assert_eq!(result.repairs[1].entity_id(), "b");
    }
}
