//! Integration tests for the provenance ledger against the SQLite store

use chronicle_domain::{
    now_millis, params, AccessMode, ActionInput, ActionStatus, AuthorType, CommitInput,
    EdgeFactInput, GraphStore, Params, RecordExt, RecordSet, Statement, TxOutcome,
};
use chronicle_ledger::{
    ClassificationInput, Classifier, LedgerConfig, LedgerError, ProvenanceLedger, SlotMatch,
    TaxonomyRecorder, ValidationEvent, CLASSIFIED_AS,
};
use chronicle_store::{SqliteGraphStore, StoreError};
use proptest::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn ledger() -> ProvenanceLedger<SqliteGraphStore> {
    init_tracing();
    let store = Arc::new(SqliteGraphStore::in_memory().unwrap());
    ProvenanceLedger::from_config(store, LedgerConfig::default_test_config())
}

fn commit(ledger: &ProvenanceLedger<SqliteGraphStore>, org_id: &str) -> String {
    ledger
        .create_commit(CommitInput::new(org_id, "m", "u1", AuthorType::User))
        .unwrap()
}

fn open_versions(ledger: &ProvenanceLedger<SqliteGraphStore>, org_id: &str, entity_id: &str) -> usize {
    ledger
        .entity_history(org_id, entity_id)
        .unwrap()
        .iter()
        .filter(|v| v.is_current())
        .count()
}

fn tick() {
    sleep(Duration::from_millis(5));
}

// ------------------------------------------------------------------
// Commits
// ------------------------------------------------------------------

#[test]
fn test_commit_roundtrip_validates() {
    let ledger = ledger();
    let commit_id = ledger
        .create_commit(CommitInput::new("o1", "m", "u1", AuthorType::User))
        .unwrap();

    assert!(uuid::Uuid::parse_str(&commit_id).is_ok());
    assert!(ledger.validate_commit(&commit_id).unwrap());

    let stored = ledger.get_commit(&commit_id).unwrap().unwrap();
    assert_eq!(stored.org_id, "o1");
    assert_eq!(stored.branch_name, "main");
    assert!(stored.signature.is_some());
}

#[test]
fn test_tampered_commit_fails_validation() {
    let ledger = ledger();
    let commit_id = commit(&ledger, "o1");

    ledger
        .store()
        .run(
            "UPDATE commits SET message = 'rewritten' WHERE id = :id",
            params! { "id" => &commit_id },
            AccessMode::Write,
            None,
        )
        .unwrap();

    assert!(!ledger.validate_commit(&commit_id).unwrap());
}

#[test]
fn test_every_signed_field_is_covered() {
    let ledger = ledger();
    let tampering = [
        "UPDATE commits SET org_id = 'o2' WHERE id = :id",
        "UPDATE commits SET author = 'mallory' WHERE id = :id",
        "UPDATE commits SET author_type = 'system' WHERE id = :id",
        "UPDATE commits SET branch_name = 'other' WHERE id = :id",
        "UPDATE commits SET parent_commit_id = 'forged' WHERE id = :id",
    ];

    for update in tampering {
        let commit_id = commit(&ledger, "o1");
        ledger
            .store()
            .run(update, params! { "id" => &commit_id }, AccessMode::Write, None)
            .unwrap();
        assert!(!ledger.validate_commit(&commit_id).unwrap(), "{} went undetected", update);
    }
}

#[test]
fn test_unsigned_or_corrupt_commit_is_invalid_not_error() {
    let ledger = ledger();
    let unsigned = commit(&ledger, "o1");
    let corrupt = commit(&ledger, "o1");

    ledger
        .store()
        .run(
            "UPDATE commits SET signature = NULL WHERE id = :id",
            params! { "id" => &unsigned },
            AccessMode::Write,
            None,
        )
        .unwrap();
    ledger
        .store()
        .run(
            "UPDATE commits SET author_type = 'robot', signature = 'zz' WHERE id = :id",
            params! { "id" => &corrupt },
            AccessMode::Write,
            None,
        )
        .unwrap();

    assert!(!ledger.validate_commit(&unsigned).unwrap());
    assert!(!ledger.validate_commit(&corrupt).unwrap());
}

#[test]
fn test_validate_missing_commit() {
    let ledger = ledger();
    assert!(matches!(
        ledger.validate_commit("nope"),
        Err(LedgerError::CommitNotFound(id)) if id == "nope"
    ));
}

#[test]
fn test_blank_org_rejected_before_write() {
    let ledger = ledger();
    let result = ledger.create_commit(CommitInput::new("  ", "m", "u1", AuthorType::User));
    assert!(matches!(result, Err(LedgerError::InvalidContext(_))));

    let rows = ledger
        .store()
        .run("SELECT COUNT(*) AS n FROM commits", params!(), AccessMode::Read, None)
        .unwrap();
    assert_eq!(rows.first().and_then(|r| r.i64_field("n")), Some(0));
}

#[test]
fn test_commits_chain_to_branch_head() {
    let ledger = ledger();
    let first = commit(&ledger, "o1");
    let second = commit(&ledger, "o1");
    let other_org = commit(&ledger, "o2");
    let explicit = ledger
        .create_commit(CommitInput::new("o1", "m", "u1", AuthorType::Agent).with_parent(&first))
        .unwrap();

    assert_eq!(ledger.get_commit(&first).unwrap().unwrap().parent_commit_id, None);
    assert_eq!(
        ledger.get_commit(&second).unwrap().unwrap().parent_commit_id.as_deref(),
        Some(first.as_str())
    );
    assert_eq!(ledger.get_commit(&other_org).unwrap().unwrap().parent_commit_id, None);
    assert_eq!(
        ledger.get_commit(&explicit).unwrap().unwrap().parent_commit_id.as_deref(),
        Some(first.as_str())
    );

    let head = ledger.branch_head("o1", "main").unwrap().unwrap();
    assert_eq!(head.id, explicit);

    let history: Vec<String> = ledger
        .commit_history("o1", "main", 10)
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(history, vec![explicit.clone(), first.clone()]);

    assert_eq!(ledger.commit_history("o1", "main", 1).unwrap().len(), 1);
}

#[test]
fn test_branches_are_independent() {
    let ledger = ledger();
    commit(&ledger, "o1");
    let feature = ledger
        .create_commit(CommitInput::new("o1", "m", "u1", AuthorType::User).on_branch("feature"))
        .unwrap();

    let stored = ledger.get_commit(&feature).unwrap().unwrap();
    assert_eq!(stored.branch_name, "feature");
    assert_eq!(stored.parent_commit_id, None);
}

// ------------------------------------------------------------------
// Actions
// ------------------------------------------------------------------

#[test]
fn test_actions_belong_to_commit() {
    let ledger = ledger();
    let commit_id = commit(&ledger, "o1");

    ledger
        .create_action(
            &commit_id,
            ActionInput::success("UPLOAD", "uploader", "File", "f1")
                .with_inputs(json!({"name": "a.mov"}))
                .with_outputs(json!({"size": 3})),
            "o1",
        )
        .unwrap();
    ledger
        .create_action(
            &commit_id,
            ActionInput::success("TRANSCODE", "ffmpeg", "File", "f1").failed("codec"),
            "o1",
        )
        .unwrap();

    let actions = ledger.commit_actions(&commit_id).unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].action_type, "UPLOAD");
    assert_eq!(actions[0].inputs, json!({"name": "a.mov"}));
    assert_eq!(actions[0].outputs, json!({"size": 3}));
    assert_eq!(actions[1].status, ActionStatus::Failed);
    assert_eq!(actions[1].error_message.as_deref(), Some("codec"));
}

#[test]
fn test_action_for_missing_commit() {
    let ledger = ledger();
    let result = ledger.create_action("missing", ActionInput::success("X", "t", "File", "f1"), "o1");
    assert!(matches!(result, Err(LedgerError::CommitNotFound(_))));
}

#[test]
fn test_action_for_commit_of_other_org() {
    let ledger = ledger();
    let commit_id = commit(&ledger, "o1");
    let result = ledger.create_action(&commit_id, ActionInput::success("X", "t", "File", "f1"), "o2");
    assert!(matches!(result, Err(LedgerError::CommitNotFound(_))));
}

// ------------------------------------------------------------------
// Entity versions
// ------------------------------------------------------------------

#[test]
fn test_version_dedup_and_replace() {
    let ledger = ledger();
    let c1 = commit(&ledger, "o1");

    let v1 = ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 1}), &c1)
        .unwrap();
    let again = ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 1}), &c1)
        .unwrap();
    assert_eq!(v1, again);
    assert_eq!(ledger.entity_history("o1", "f1").unwrap().len(), 1);

    let c2 = commit(&ledger, "o1");
    let v2 = ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 2}), &c2)
        .unwrap();
    assert_ne!(v1, v2);

    let history = ledger.entity_history("o1", "f1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, v1);
    assert!(history[0].valid_to.is_some());
    assert_eq!(history[0].ended_by_commit.as_deref(), Some(c2.as_str()));
    assert_eq!(history[1].id, v2);
    assert!(history[1].is_current());
    assert_eq!(history[0].valid_to, Some(history[1].valid_from));

    let current = ledger.current_version("o1", "f1").unwrap().unwrap();
    assert_eq!(current.id, v2);
    assert_eq!(current.properties, json!({"a": 2}));
}

#[test]
fn test_versions_are_org_scoped() {
    let ledger = ledger();
    let c1 = commit(&ledger, "o1");
    let c2 = commit(&ledger, "o2");

    let a = ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 1}), &c1)
        .unwrap();
    let b = ledger
        .create_or_get_version("o2", "f1", "File", &json!({"a": 1}), &c2)
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(open_versions(&ledger, "o1", "f1"), 1);
    assert_eq!(open_versions(&ledger, "o2", "f1"), 1);
}

/// Store that lets a rival writer commit just before the next transaction
struct RacingStore {
    inner: SqliteGraphStore,
    rival: Mutex<Vec<Statement>>,
}

impl GraphStore for RacingStore {
    type Error = StoreError;

    fn run(
        &self,
        query: &str,
        params: Params,
        mode: AccessMode,
        org_id: Option<&str>,
    ) -> Result<RecordSet, StoreError> {
        self.inner.run(query, params, mode, org_id)
    }

    fn run_in_transaction(
        &self,
        statements: Vec<Statement>,
        org_id: Option<&str>,
    ) -> Result<TxOutcome, StoreError> {
        let rival = std::mem::take(&mut *self.rival.lock().unwrap());
        if !rival.is_empty() {
            self.inner.run_in_transaction(rival, org_id)?;
        }
        self.inner.run_in_transaction(statements, org_id)
    }
}

#[test]
fn test_concurrent_replacement_conflicts() {
    init_tracing();
    let store = Arc::new(RacingStore {
        inner: SqliteGraphStore::in_memory().unwrap(),
        rival: Mutex::new(Vec::new()),
    });
    let ledger = ProvenanceLedger::from_config(Arc::clone(&store), LedgerConfig::default_test_config());
    let c = ledger
        .create_commit(CommitInput::new("o1", "m", "u1", AuthorType::User))
        .unwrap();
    let v1 = ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 1}), &c)
        .unwrap();

    *store.rival.lock().unwrap() = vec![
        Statement::new(
            "UPDATE entity_versions SET valid_to = 1 WHERE id = :id",
            params! { "id" => &v1 },
        ),
        Statement::new(
            "INSERT INTO entity_versions (id, entity_id, entity_type, properties, valid_from, created_by_commit, org_id, content_hash)
             VALUES ('rival', 'f1', 'File', '{\"a\":9}', 2, :c, :org_id, 'h')",
            params! { "c" => &c },
        ),
    ];

    let result = ledger.create_or_get_version("o1", "f1", "File", &json!({"a": 3}), &c);
    assert!(matches!(result, Err(LedgerError::Conflict(id)) if id == "f1"));

    let history = ledger.entity_history("o1", "f1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(ledger.current_version("o1", "f1").unwrap().unwrap().id, "rival");
}

#[test]
fn test_entity_at_time_uses_half_open_intervals() {
    let ledger = ledger();
    let c = commit(&ledger, "o1");

    let before = now_millis() - 1;
    tick();
    ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 1}), &c)
        .unwrap();
    tick();
    let during_first = now_millis();
    tick();
    ledger
        .create_or_get_version("o1", "f1", "File", &json!({"a": 2}), &c)
        .unwrap();
    tick();

    let history = ledger.entity_history("o1", "f1").unwrap();
    let boundary = history[1].valid_from;

    assert_eq!(ledger.get_entity_at_time("f1", before, "o1").unwrap(), None);
    assert_eq!(
        ledger.get_entity_at_time("f1", during_first, "o1").unwrap(),
        Some(json!({"a": 1}))
    );
    assert_eq!(
        ledger.get_entity_at_time("f1", boundary, "o1").unwrap(),
        Some(json!({"a": 2}))
    );
    assert_eq!(
        ledger.get_entity_at_time("f1", now_millis(), "o1").unwrap(),
        Some(json!({"a": 2}))
    );
    assert_eq!(ledger.get_entity_at_time("f1", now_millis(), "o2").unwrap(), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_single_open_version(values in prop::collection::vec(0u8..4, 1..12)) {
        let ledger = ledger();
        let c = commit(&ledger, "o1");

        for value in &values {
            ledger
                .create_or_get_version("o1", "f1", "File", &json!({ "v": value }), &c)
                .unwrap();
        }

        prop_assert_eq!(open_versions(&ledger, "o1", "f1"), 1);

        // Content seen before is never stored twice
        let distinct: std::collections::BTreeSet<_> = values.iter().collect();
        prop_assert_eq!(ledger.entity_history("o1", "f1").unwrap().len(), distinct.len());
    }
}

// ------------------------------------------------------------------
// Edge facts
// ------------------------------------------------------------------

#[test]
fn test_create_edge_fact_records_commit_and_action() {
    let ledger = ledger();
    let id = ledger
        .create_edge_fact(
            "o1",
            "u1",
            EdgeFactInput::new("FOR_SCENE", "shot1", "scene1").with_props(json!({"take": 2})),
        )
        .unwrap();

    let fact = ledger.get_edge_fact("o1", &id).unwrap().unwrap();
    assert!(fact.is_active());
    assert_eq!(fact.props, json!({"take": 2}));

    let commit = ledger.get_commit(&fact.created_by_commit).unwrap().unwrap();
    assert_eq!(commit.message, "Created relationship: FOR_SCENE");
    assert_eq!(commit.author, "u1");

    let actions = ledger.commit_actions(&commit.id).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, "CREATE_EDGE_FACT");
    assert_eq!(actions[0].entity_id, id);
}

#[test]
fn test_create_edge_fact_does_not_enforce_uniqueness() {
    let ledger = ledger();
    ledger
        .create_edge_fact("o1", "u1", EdgeFactInput::new("TAGGED", "f1", "t1"))
        .unwrap();
    ledger
        .create_edge_fact("o1", "u1", EdgeFactInput::new("TAGGED", "f1", "t2"))
        .unwrap();
    assert_eq!(ledger.active_edge_facts("o1", "f1", Some("TAGGED")).unwrap().len(), 2);
}

#[test]
fn test_replace_edge_fact_keeps_one_open() {
    let ledger = ledger();
    let first = ledger
        .replace_edge_fact("o1", "u1", EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_X"))
        .unwrap();
    assert!(first.ended.is_empty());

    let second = ledger
        .replace_edge_fact("o1", "u1", EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_Y"))
        .unwrap();
    assert_eq!(second.ended, vec![first.id.clone()]);

    let active = ledger.active_edge_facts("o1", "f1", Some(CLASSIFIED_AS)).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].to_id, "SLOT_Y");

    let history = ledger.edge_fact_history("o1", "f1", CLASSIFIED_AS).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].to_id, "SLOT_X");
    assert!(history[0].valid_to.is_some());
}

#[test]
fn test_replace_in_missing_commit_rolls_back() {
    let ledger = ledger();
    let original = ledger
        .replace_edge_fact("o1", "u1", EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_X"))
        .unwrap();

    let result = ledger.replace_edge_fact_in_commit(
        "missing",
        "o1",
        &EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_Y"),
    );
    assert!(matches!(result, Err(LedgerError::CommitNotFound(_))));

    // The close was rolled back with the failed insert
    let active = ledger.active_edge_facts("o1", "f1", Some(CLASSIFIED_AS)).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, original.id);
}

#[test]
fn test_end_edge_fact_is_idempotent() {
    let ledger = ledger();
    let id = ledger
        .create_edge_fact("o1", "u1", EdgeFactInput::new("FOR_SCENE", "shot1", "scene1"))
        .unwrap();

    assert!(ledger.end_edge_fact(&id, "o1", "u1").unwrap());
    let ended = ledger.get_edge_fact("o1", &id).unwrap().unwrap();
    assert!(ended.valid_to.is_some());
    assert!(ended.ended_by_commit.is_some());

    tick();
    assert!(!ledger.end_edge_fact(&id, "o1", "u1").unwrap());
    let after = ledger.get_edge_fact("o1", &id).unwrap().unwrap();
    assert_eq!(after.valid_to, ended.valid_to);
    assert_eq!(after.ended_by_commit, ended.ended_by_commit);

    assert!(!ledger.end_edge_fact("unknown", "o1", "u1").unwrap());
}

#[test]
fn test_edge_facts_at_time() {
    let ledger = ledger();
    ledger
        .replace_edge_fact("o1", "u1", EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_X"))
        .unwrap();
    tick();
    let between = now_millis();
    tick();
    ledger
        .replace_edge_fact("o1", "u1", EdgeFactInput::new(CLASSIFIED_AS, "f1", "SLOT_Y"))
        .unwrap();

    let then = ledger.edge_facts_at_time("o1", "f1", CLASSIFIED_AS, between).unwrap();
    assert_eq!(then.len(), 1);
    assert_eq!(then[0].to_id, "SLOT_X");

    let now = ledger
        .edge_facts_at_time("o1", "f1", CLASSIFIED_AS, now_millis())
        .unwrap();
    assert_eq!(now.len(), 1);
    assert_eq!(now[0].to_id, "SLOT_Y");
}

// ------------------------------------------------------------------
// Audit and system commits
// ------------------------------------------------------------------

#[test]
fn test_audit_reports_tampered_commits() {
    let ledger = ledger();
    commit(&ledger, "o1");
    let bad = commit(&ledger, "o1");
    commit(&ledger, "o2");

    ledger
        .store()
        .run(
            "UPDATE commits SET message = 'x' WHERE id = :id",
            params! { "id" => &bad },
            AccessMode::Write,
            None,
        )
        .unwrap();

    let report = ledger.audit_commits("o1", 100).unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.invalid, vec![bad]);
    assert!(!report.is_clean());

    assert!(ledger.audit_commits("o2", 100).unwrap().is_clean());
}

#[test]
fn test_validation_event_is_a_system_commit() {
    let ledger = ledger();
    let commit_id = ledger
        .record_validation_event(&ValidationEvent {
            org_id: "o1".to_string(),
            rules_checked: 3,
            entities_validated: 2,
            violations_found: 2,
            violations_repaired: 1,
        })
        .unwrap();

    let commit = ledger.get_commit(&commit_id).unwrap().unwrap();
    assert_eq!(commit.author, "cross-layer-engine");
    assert_eq!(commit.author_type, AuthorType::System);
    assert_eq!(commit.metadata["violations_repaired"], json!(1));
    assert!(ledger.validate_commit(&commit_id).unwrap());

    let actions = ledger.commit_actions(&commit_id).unwrap();
    assert_eq!(actions[0].action_type, "VALIDATE_CROSS_LAYER");
    assert_eq!(actions[0].outputs["violations_found"], json!(2));
}

// ------------------------------------------------------------------
// Taxonomy
// ------------------------------------------------------------------

struct ExtensionClassifier;

impl Classifier for ExtensionClassifier {
    fn classify(&self, input: &ClassificationInput) -> Option<SlotMatch> {
        input.file_name.ends_with(".mov").then(|| SlotMatch {
            slot_id: "SLOT_FOOTAGE".to_string(),
            confidence: 0.8,
            method: "rule".to_string(),
            rule_id: Some("ext-mov".to_string()),
        })
    }
}

fn slot(slot_id: &str) -> SlotMatch {
    SlotMatch {
        slot_id: slot_id.to_string(),
        confidence: 0.9,
        method: "manual".to_string(),
        rule_id: None,
    }
}

#[test]
fn test_reclassification_keeps_history() {
    let ledger = ledger();
    let recorder = TaxonomyRecorder::new(ledger.clone());

    let x = recorder.record_classification("o1", "u1", "f1", &slot("SLOT_X")).unwrap();
    let y = recorder.record_classification("o1", "u1", "f1", &slot("SLOT_Y")).unwrap();
    assert_ne!(x, y);

    let current = recorder.current_classification("o1", "f1").unwrap().unwrap();
    assert_eq!(current.id, y);
    assert_eq!(current.to_id, "SLOT_Y");
    assert_eq!(current.props["confidence"], json!(0.9));
    assert_eq!(current.props["method"], json!("manual"));

    let history = recorder.classification_history("o1", "f1").unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].is_active());

    let commit = ledger.get_commit(&current.created_by_commit).unwrap().unwrap();
    assert_eq!(commit.message, "Classified file f1 as SLOT_Y");
    let actions = ledger.commit_actions(&commit.id).unwrap();
    assert_eq!(actions[0].action_type, "CLASSIFY_FILE");
}

#[test]
fn test_classify_file_without_match_writes_nothing() {
    let ledger = ledger();
    let recorder = TaxonomyRecorder::new(ledger.clone());

    let input = ClassificationInput {
        file_id: "f1".to_string(),
        file_name: "notes.txt".to_string(),
        ..Default::default()
    };
    assert_eq!(recorder.classify_file("o1", "u1", &input, &ExtensionClassifier).unwrap(), None);
    assert!(ledger.branch_head("o1", "main").unwrap().is_none());

    let input = ClassificationInput {
        file_id: "f2".to_string(),
        file_name: "take1.mov".to_string(),
        ..Default::default()
    };
    let fact_id = recorder
        .classify_file("o1", "u1", &input, &ExtensionClassifier)
        .unwrap()
        .unwrap();
    let fact = ledger.get_edge_fact("o1", &fact_id).unwrap().unwrap();
    assert_eq!(fact.to_id, "SLOT_FOOTAGE");
    assert_eq!(fact.props["rule_id"], json!("ext-mov"));
}

#[test]
fn test_signatures_survive_reopen_with_same_secret() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chronicle.db");

    let commit_id = {
        let store = Arc::new(SqliteGraphStore::new(&path).unwrap());
        let ledger = ProvenanceLedger::from_config(store, LedgerConfig::default_test_config());
        commit(&ledger, "o1")
    };

    let store = Arc::new(SqliteGraphStore::new(&path).unwrap());
    let same = ProvenanceLedger::from_config(Arc::clone(&store), LedgerConfig::default_test_config());
    assert!(same.validate_commit(&commit_id).unwrap());

    let mut other_config = LedgerConfig::default_test_config();
    other_config.signing_secret = "another-secret".to_string();
    let other = ProvenanceLedger::from_config(store, other_config);
    assert!(!other.validate_commit(&commit_id).unwrap());
}
