//! Integration tests for cross-layer validation against the SQLite store

use chronicle_crosslayer::{
    builtin_rules, CrossLayerEngine, CrossLayerLinkRequest, EngineConfig, EngineError,
    EngineState, RepairOutcome, RuleRegistry, ValidationWorker, FILE_CLUSTER, SHOT_SCENE,
};
use chronicle_domain::{
    params, AccessMode, AuthorType, CommitInput, CrossLayerRule, GraphStore, Layer, RecordExt,
    RepairPlan,
};
use chronicle_ledger::{LedgerConfig, LedgerError, ProvenanceLedger};
use chronicle_store::SqliteGraphStore;
use serde_json::json;
use std::sync::Arc;

type Ledger = ProvenanceLedger<SqliteGraphStore>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn ledger() -> Ledger {
    init_tracing();
    let store = Arc::new(SqliteGraphStore::in_memory().unwrap());
    ProvenanceLedger::from_config(store, LedgerConfig::default_test_config())
}

fn file_rule() -> CrossLayerRule {
    builtin_rules()
        .into_iter()
        .find(|r| r.id == FILE_CLUSTER)
        .unwrap()
}

fn insert_node(ledger: &Ledger, id: &str, label: &str, org_id: &str) {
    ledger
        .store()
        .run(
            "INSERT INTO nodes (id, label, org_id, properties, created_at) VALUES (:id, :label, :org_id, '{}', 0)",
            params! { "id" => id, "label" => label },
            AccessMode::Write,
            Some(org_id),
        )
        .unwrap();
}

fn count(ledger: &Ledger, query: &str, org_id: &str) -> i64 {
    ledger
        .store()
        .run(query, params!(), AccessMode::Read, Some(org_id))
        .unwrap()
        .first()
        .and_then(|r| r.i64_field("n"))
        .unwrap()
}

fn cluster_links(ledger: &Ledger, file_id: &str) -> i64 {
    ledger
        .store()
        .run(
            "SELECT COUNT(*) AS n FROM edges e JOIN nodes c ON c.id = e.to_id
             WHERE e.from_id = :file_id AND e.type = 'BELONGS_TO_CLUSTER' AND c.label = 'ContentCluster'",
            params! { "file_id" => file_id },
            AccessMode::Read,
            None,
        )
        .unwrap()
        .first()
        .and_then(|r| r.i64_field("n"))
        .unwrap()
}

// ------------------------------------------------------------------
// Validation and repair
// ------------------------------------------------------------------

#[test]
fn test_missing_cluster_is_found_and_repaired() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let mut engine = CrossLayerEngine::new(
        ledger.clone(),
        RuleRegistry::from_rules(vec![file_rule()]),
        EngineConfig::default(),
    );
    let results = engine.validate_all_cross_layer_links("o1").unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].violations_found(), 1);
    assert_eq!(results[0].violations_repaired(), 1);
    assert_eq!(results[0].violations[0].entity_id, "f1");
    assert_eq!(results[0].violations[0].violation_type, "MISSING_CLUSTER");
    assert_eq!(
        results[0].repairs[0],
        RepairOutcome::Repaired {
            entity_id: "f1".to_string(),
            repair_action: "created_cluster".to_string(),
        }
    );

    assert_eq!(cluster_links(&ledger, "f1"), 1);
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn test_repairs_are_idempotent() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o1");
    insert_node(&ledger, "s1", "Shot", "o1");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());

    let first = engine.validate_all_cross_layer_links("o1").unwrap();
    let file_result = first.iter().find(|r| r.rule_id == FILE_CLUSTER).unwrap();
    assert_eq!(file_result.violations_found(), 2);
    assert_eq!(file_result.violations_repaired(), 2);

    let second = engine.validate_all_cross_layer_links("o1").unwrap();
    for result in &second {
        let rule = engine.registry().get(&result.rule_id).unwrap();
        if rule.has_repair() {
            assert_eq!(result.violations_found(), 0, "{} still has violations", rule.id);
        }
    }

    // Shots cannot be repaired, so the violation persists
    let shot = second.iter().find(|r| r.rule_id == SHOT_SCENE).unwrap();
    assert_eq!(shot.violations_found(), 1);
    assert!(shot.repairs.is_empty());

    assert_eq!(count(&ledger, "SELECT COUNT(*) AS n FROM nodes WHERE label = 'ContentCluster' AND org_id = :org_id", "o1"), 2);
    assert_eq!(engine.metrics().run_count, 2);
    assert_eq!(engine.metrics().total_repaired(), 2);
}

#[test]
fn test_sweep_is_recorded_as_system_commit() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    engine.validate_all_cross_layer_links("o1").unwrap();

    let head = ledger.branch_head("o1", "main").unwrap().unwrap();
    assert_eq!(head.author, "cross-layer-engine");
    assert_eq!(head.author_type, AuthorType::System);
    assert_eq!(head.metadata["violations_found"], json!(1));
    assert_eq!(head.metadata["violations_repaired"], json!(1));
    assert_eq!(head.metadata["entities_validated"], json!(1));
    assert!(ledger.validate_commit(&head.id).unwrap());

    let actions = ledger.commit_actions(&head.id).unwrap();
    assert_eq!(actions[0].action_type, "VALIDATE_CROSS_LAYER");
}

#[test]
fn test_entities_validated_counts_checked_entities() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");

    let mut engine = CrossLayerEngine::new(
        ledger.clone(),
        RuleRegistry::from_rules(vec![file_rule()]),
        EngineConfig::report_only(),
    );
    engine.create_cross_layer_link("o1", &link_request(false), None).unwrap();
    engine.validate_all_cross_layer_links("o1").unwrap();

    let head = ledger.branch_head("o1", "main").unwrap().unwrap();
    assert_eq!(head.metadata["entities_validated"], json!(2));
    assert_eq!(head.metadata["violations_found"], json!(1));
    assert_eq!(head.metadata["violations_repaired"], json!(0));
}

#[test]
fn test_repairs_are_recorded_in_signed_commit() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let mut engine = CrossLayerEngine::new(
        ledger.clone(),
        RuleRegistry::from_rules(vec![file_rule()]),
        EngineConfig::default(),
    );
    engine.validate_all_cross_layer_links("o1").unwrap();

    let edges = ledger
        .store()
        .run(
            "SELECT created_by_commit FROM edges WHERE from_id = 'f1' AND type = 'BELONGS_TO_CLUSTER'",
            params!(),
            AccessMode::Read,
            None,
        )
        .unwrap();
    let commit_id = edges.first().unwrap().str_field("created_by_commit").unwrap().to_string();

    let commit = ledger.get_commit(&commit_id).unwrap().unwrap();
    assert_eq!(commit.author, "cross-layer-engine");
    assert_eq!(commit.author_type, AuthorType::System);
    assert!(commit.message.contains(FILE_CLUSTER), "{}", commit.message);
    assert!(ledger.validate_commit(&commit_id).unwrap());

    let actions = ledger.commit_actions(&commit_id).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, "REPAIR_CROSS_LAYER");
    assert_eq!(actions[0].entity_type, "File");
    assert_eq!(actions[0].entity_id, "f1");
    assert_eq!(actions[0].inputs["rule_id"], json!(FILE_CLUSTER));
    assert_eq!(actions[0].outputs["repair_action"], json!("created_cluster"));

    let clusters = ledger
        .store()
        .run(
            "SELECT properties FROM nodes WHERE label = 'ContentCluster'",
            params!(),
            AccessMode::Read,
            None,
        )
        .unwrap();
    assert_eq!(clusters.first().unwrap().json_field("properties")["created_by_commit"], json!(commit_id));

    // The validation event is chained after the repair commit
    let head = ledger.branch_head("o1", "main").unwrap().unwrap();
    assert_eq!(head.parent_commit_id.as_deref(), Some(commit_id.as_str()));

    // Nothing left to repair: only the validation event is committed
    let commits = "SELECT COUNT(*) AS n FROM commits WHERE org_id = :org_id";
    assert_eq!(count(&ledger, commits, "o1"), 2);
    engine.validate_all_cross_layer_links("o1").unwrap();
    assert_eq!(count(&ledger, commits, "o1"), 3);
}

#[test]
fn test_validation_is_org_scoped() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o2");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::report_only());
    let results = engine.validate_all_cross_layer_links("o2").unwrap();
    let file_result = results.iter().find(|r| r.rule_id == FILE_CLUSTER).unwrap();

    assert_eq!(file_result.violations_found(), 1);
    assert_eq!(file_result.violations[0].entity_id, "f2");
    assert_eq!(file_result.entities_checked, 1);
}

#[test]
fn test_report_only_leaves_graph_untouched() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::report_only());
    let results = engine.validate_all_cross_layer_links("o1").unwrap();
    let file_result = results.iter().find(|r| r.rule_id == FILE_CLUSTER).unwrap();

    assert_eq!(file_result.violations_found(), 1);
    assert!(file_result.repairs.is_empty());
    assert_eq!(cluster_links(&ledger, "f1"), 0);
}

#[test]
fn test_edge_fact_satisfies_rule() {
    let ledger = ledger();
    insert_node(&ledger, "s1", "Shot", "o1");
    insert_node(&ledger, "sc1", "Scene", "o1");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    assert_eq!(engine.validate_rule_by_id("o1", SHOT_SCENE).unwrap().violations_found(), 1);

    engine
        .create_cross_layer_link(
            "o1",
            &CrossLayerLinkRequest {
                from_id: "s1".to_string(),
                to_id: "sc1".to_string(),
                from_layer: Layer::Reality,
                to_layer: Layer::Creative,
                relationship_type: "FOR_SCENE".to_string(),
                method: "manual".to_string(),
                confidence: 1.0,
                temporal: true,
                user_id: "u1".to_string(),
            },
            None,
        )
        .unwrap();
    assert!(engine.validate_rule_by_id("o1", SHOT_SCENE).unwrap().is_satisfied());
}

#[test]
fn test_failed_repair_does_not_abort_run() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o1");

    let mut broken = file_rule();
    broken.id = "broken".to_string();
    broken.repair = Some(RepairPlan::single("INSERT INTO no_such_table VALUES (:entity_id)"));

    let mut engine = CrossLayerEngine::new(
        ledger.clone(),
        RuleRegistry::from_rules(vec![broken, file_rule()]),
        EngineConfig::default(),
    );
    let results = engine.validate_all_cross_layer_links("o1").unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].violations_found(), 2);
    assert!(results[0]
        .repairs
        .iter()
        .all(|r| matches!(r, RepairOutcome::Failed { .. })));
    assert_eq!(results[1].violations_repaired(), 2);
    assert_eq!(engine.metrics().total_failed(), 2);
}

#[test]
fn test_repair_with_no_rows_is_rolled_back() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let mut rule = file_rule();
    let mut statements = rule.repair.take().unwrap().statements;
    // Final statement matches nothing, so the cluster insert must not stick
    statements[1] = "SELECT 'never' AS repair_action WHERE 0".to_string();
    rule.repair = Some(RepairPlan::new(statements));

    let mut engine = CrossLayerEngine::new(ledger.clone(), RuleRegistry::new(), EngineConfig::default());
    let result = engine.validate_rule("o1", &rule).unwrap();

    assert_eq!(
        result.repairs,
        vec![RepairOutcome::Unchanged {
            entity_id: "f1".to_string()
        }]
    );
    assert_eq!(count(&ledger, "SELECT COUNT(*) AS n FROM nodes WHERE label = 'ContentCluster' AND org_id = :org_id", "o1"), 0);
}

#[test]
fn test_targeted_repair() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o1");

    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::report_only());
    let outcomes = engine.repair_violations("o1", &["f2".to_string()]).unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].entity_id(), "f2");
    assert!(outcomes[0].is_repaired());
    assert_eq!(cluster_links(&ledger, "f1"), 0);
    assert_eq!(cluster_links(&ledger, "f2"), 1);

    assert!(engine.repair_violations("o1", &[]).unwrap().is_empty());
}

#[test]
fn test_disabled_rules_are_skipped() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let config = EngineConfig {
        disabled_rules: vec![FILE_CLUSTER.to_string(), "unknown".to_string()],
        ..EngineConfig::default()
    };
    let mut engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), config);
    let results = engine.validate_all_cross_layer_links("o1").unwrap();

    assert!(results.iter().all(|r| r.rule_id != FILE_CLUSTER));
    assert_eq!(cluster_links(&ledger, "f1"), 0);

    engine.registry_mut().enable(FILE_CLUSTER).unwrap();
    let results = engine.validate_all_cross_layer_links("o1").unwrap();
    assert_eq!(results[0].rule_id, FILE_CLUSTER);
}

#[test]
fn test_unknown_rule_and_blank_org() {
    let mut engine = CrossLayerEngine::with_builtin_rules(ledger(), EngineConfig::default());
    assert!(matches!(
        engine.validate_rule_by_id("o1", "nope"),
        Err(EngineError::RuleNotFound(_))
    ));
    assert!(matches!(
        engine.validate_all_cross_layer_links(""),
        Err(EngineError::InvalidContext(_))
    ));
}

// ------------------------------------------------------------------
// Links
// ------------------------------------------------------------------

fn link_request(temporal: bool) -> CrossLayerLinkRequest {
    CrossLayerLinkRequest {
        from_id: "f1".to_string(),
        to_id: "c1".to_string(),
        from_layer: Layer::Operations,
        to_layer: Layer::Creative,
        relationship_type: "BELONGS_TO_CLUSTER".to_string(),
        method: "classifier".to_string(),
        confidence: 0.75,
        temporal,
        user_id: "u1".to_string(),
    }
}

#[test]
fn test_temporal_link_records_metadata() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    let id = engine.create_cross_layer_link("o1", &link_request(true), None).unwrap();

    let fact = ledger.get_edge_fact("o1", &id).unwrap().unwrap();
    assert_eq!(fact.from_type.as_deref(), Some("File"));
    assert_eq!(fact.to_type.as_deref(), Some("ContentCluster"));
    assert_eq!(
        fact.props["metadata"],
        json!({
            "from_layer": "operations",
            "to_layer": "creative",
            "method": "classifier",
            "confidence": 0.75,
        })
    );
}

#[test]
fn test_temporal_link_in_existing_commit() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");
    let commit_id = ledger
        .create_commit(CommitInput::new("o1", "Import", "u1", AuthorType::User))
        .unwrap();

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    let id = engine
        .create_cross_layer_link("o1", &link_request(true), Some(&commit_id))
        .unwrap();

    let fact = ledger.get_edge_fact("o1", &id).unwrap().unwrap();
    assert_eq!(fact.created_by_commit, commit_id);
}

#[test]
fn test_direct_link_is_plain_edge() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    let id = engine.create_cross_layer_link("o1", &link_request(false), None).unwrap();

    let edge = ledger
        .store()
        .run(
            "SELECT type, properties FROM edges WHERE id = :id",
            params! { "id" => &id },
            AccessMode::Read,
            None,
        )
        .unwrap();
    let edge = edge.first().unwrap();
    assert_eq!(edge.str_field("type"), Some("BELONGS_TO_CLUSTER"));
    assert_eq!(edge.json_field("properties")["method"], json!("classifier"));
    assert_eq!(cluster_links(&ledger, "f1"), 1);
}

#[test]
fn test_direct_link_in_existing_commit() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");
    let commit_id = ledger
        .create_commit(CommitInput::new("o1", "Import", "u1", AuthorType::User))
        .unwrap();

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    let id = engine
        .create_cross_layer_link("o1", &link_request(false), Some(&commit_id))
        .unwrap();

    let edge = ledger
        .store()
        .run(
            "SELECT created_by_commit FROM edges WHERE id = :id",
            params! { "id" => &id },
            AccessMode::Read,
            None,
        )
        .unwrap();
    assert_eq!(edge.first().unwrap().str_field("created_by_commit"), Some(commit_id.as_str()));
}

#[test]
fn test_direct_link_rejects_unknown_commit() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o1");
    let other_org_commit = ledger
        .create_commit(CommitInput::new("o2", "Import", "u1", AuthorType::User))
        .unwrap();

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());
    for commit_id in ["no-such-commit", other_org_commit.as_str()] {
        let result = engine.create_cross_layer_link("o1", &link_request(false), Some(commit_id));
        assert!(
            matches!(result, Err(EngineError::Ledger(LedgerError::CommitNotFound(ref id))) if id == commit_id),
            "{:?}",
            result
        );
    }
    assert_eq!(cluster_links(&ledger, "f1"), 0);
}

#[test]
fn test_link_to_missing_entity_names_the_side() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "c1", "ContentCluster", "o2");

    let engine = CrossLayerEngine::with_builtin_rules(ledger.clone(), EngineConfig::default());

    let result = engine.create_cross_layer_link("o1", &link_request(true), None);
    assert!(matches!(result, Err(EngineError::EntityNotFound(msg)) if msg.starts_with("to ")));

    let mut request = link_request(false);
    request.from_id = "ghost".to_string();
    let result = engine.create_cross_layer_link("o1", &request, None);
    assert!(matches!(result, Err(EngineError::EntityNotFound(msg)) if msg.starts_with("from ")));

    assert_eq!(count(&ledger, "SELECT COUNT(*) AS n FROM edge_facts WHERE org_id = :org_id", "o1"), 0);
}

// ------------------------------------------------------------------
// Worker
// ------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_worker_sweeps_each_org() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");
    insert_node(&ledger, "f2", "File", "o2");

    let config = EngineConfig {
        org_ids: vec!["o1".to_string(), "o2".to_string()],
        sweep_interval_minutes: 1,
        ..EngineConfig::default()
    };
    let mut worker = ValidationWorker::new(CrossLayerEngine::with_builtin_rules(ledger.clone(), config));
    worker.run_cycles(2).await.unwrap();

    assert_eq!(worker.metrics().run_count, 4);
    assert_eq!(worker.metrics().total_repaired(), 2);
    assert_eq!(cluster_links(&ledger, "f1"), 1);
    assert_eq!(cluster_links(&ledger, "f2"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_sweeps_on_multi_thread_runtime() {
    let ledger = ledger();
    insert_node(&ledger, "f1", "File", "o1");

    let config = EngineConfig {
        org_ids: vec!["o1".to_string()],
        sweep_interval_minutes: 1,
        ..EngineConfig::default()
    };
    let mut worker = ValidationWorker::new(CrossLayerEngine::with_builtin_rules(ledger.clone(), config));
    // The first tick is immediate, so one cycle needs no time to pass
    worker.run_cycles(1).await.unwrap();

    assert_eq!(worker.metrics().run_count, 1);
    assert_eq!(cluster_links(&ledger, "f1"), 1);
}

#[tokio::test]
async fn test_worker_rejects_zero_interval() {
    let config = EngineConfig {
        sweep_interval_minutes: 0,
        ..EngineConfig::default()
    };
    let mut worker = ValidationWorker::new(CrossLayerEngine::with_builtin_rules(ledger(), config));
    assert!(matches!(worker.run_cycles(1).await, Err(EngineError::Config(_))));
}
