//! The provenance ledger: signed commits, actions, entity versions and edge facts
//!
//! Every mutation of the provenance graph goes through [`ProvenanceLedger`].
//! Commits are signed at creation and verified on demand; versions and edge
//! facts are closed rather than deleted, so history can be read back at any
//! point in time.
//!
//! A commit and the actions or versions it covers are separate writes. A
//! failure between them leaves an orphan commit, which is tolerated: the
//! commit is signed and simply covers nothing.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::queries;
use crate::rows;
use crate::signer::Ed25519Signer;
use chronicle_domain::{
    is_valid_org_id, new_id, now_millis, params, AccessMode, Action, ActionInput, AuthorType,
    Commit, CommitInput, EdgeFact, EdgeFactInput, EntityVersion, GraphStore, Params, RecordExt,
    RecordSet, Signer, Statement, Timestamp, TxOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Author recorded on commits written by the cross-layer engine
pub const ENGINE_AUTHOR: &str = "cross-layer-engine";

/// Fields covered by a commit signature, in signing order
#[derive(Serialize)]
struct CanonicalCommit<'a> {
    id: &'a str,
    org_id: &'a str,
    message: &'a str,
    author: &'a str,
    author_type: &'a str,
    parent_commit_id: Option<&'a str>,
    branch_name: &'a str,
}

impl<'a> CanonicalCommit<'a> {
    fn of(commit: &'a Commit) -> Self {
        Self {
            id: &commit.id,
            org_id: &commit.org_id,
            message: &commit.message,
            author: &commit.author,
            author_type: commit.author_type.as_str(),
            parent_commit_id: commit.parent_commit_id.as_deref(),
            branch_name: &commit.branch_name,
        }
    }

    fn to_json(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of a close-then-create on a functional relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeFactReplacement {
    /// The newly created fact
    pub id: String,
    /// Facts that were open and have been ended
    pub ended: Vec<String>,
}

/// Result of verifying a range of commits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Commits examined
    pub checked: usize,
    /// Commits whose signature is missing or does not verify
    pub invalid: Vec<String>,
}

impl AuditReport {
    /// Whether every checked commit verified
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Aggregate outcome of one cross-layer validation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEvent {
    /// Organisation the sweep ran for
    pub org_id: String,
    /// Rules evaluated
    pub rules_checked: usize,
    /// Entities of each rule's source type checked, summed over rules
    pub entities_validated: usize,
    /// Violations found
    pub violations_found: usize,
    /// Violations repaired
    pub violations_repaired: usize,
}

fn require_org(org_id: &str) -> Result<(), LedgerError> {
    if is_valid_org_id(org_id) {
        Ok(())
    } else {
        Err(LedgerError::InvalidContext("org_id is required".to_string()))
    }
}

/// Signed, append-only provenance history over a [`GraphStore`]
pub struct ProvenanceLedger<S> {
    store: Arc<S>,
    signer: Arc<dyn Signer>,
    config: LedgerConfig,
}

impl<S> Clone for ProvenanceLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            signer: Arc::clone(&self.signer),
            config: self.config.clone(),
        }
    }
}

impl<S: GraphStore> ProvenanceLedger<S> {
    /// Create a ledger with an explicit signer
    pub fn new(store: Arc<S>, signer: Arc<dyn Signer>, config: LedgerConfig) -> Self {
        Self {
            store,
            signer,
            config,
        }
    }

    /// Create a ledger signing with a key derived from `config.signing_secret`
    pub fn from_config(store: Arc<S>, config: LedgerConfig) -> Self {
        let signer = Arc::new(Ed25519Signer::from_secret(&config.signing_secret));
        Self::new(store, signer, config)
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The signer used for commits and content hashes
    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// Ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn read(&self, query: &str, params: Params, org_id: Option<&str>) -> Result<RecordSet, LedgerError> {
        self.store
            .run(query, params, AccessMode::Read, org_id)
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    fn write(&self, query: &str, params: Params, org_id: Option<&str>) -> Result<RecordSet, LedgerError> {
        self.store
            .run(query, params, AccessMode::Write, org_id)
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    fn transaction(&self, statements: Vec<Statement>, org_id: &str) -> Result<TxOutcome, LedgerError> {
        self.store
            .run_in_transaction(statements, Some(org_id))
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Commits and actions
    // ------------------------------------------------------------------

    /// Create and sign a commit, returning its id
    ///
    /// When the input names no parent and `link_parent_commits` is set, the
    /// current head of the branch becomes the parent.
    pub fn create_commit(&self, input: CommitInput) -> Result<String, LedgerError> {
        require_org(&input.org_id)?;

        let branch_name = input.branch().to_string();
        let parent_commit_id = match &input.parent_commit_id {
            Some(parent) => Some(parent.clone()),
            None if self.config.link_parent_commits => self
                .branch_head(&input.org_id, &branch_name)?
                .map(|head| head.id),
            None => None,
        };

        let commit = Commit {
            id: new_id(),
            org_id: input.org_id,
            message: input.message,
            author: input.author,
            author_type: input.author_type,
            created_at: now_millis(),
            parent_commit_id,
            branch_name,
            signature: None,
            metadata: input.metadata.unwrap_or_else(|| json!({})),
        };
        let signature = self.signer.sign(&CanonicalCommit::of(&commit).to_json()?);

        self.write(
            queries::INSERT_COMMIT,
            params! {
                "id" => &commit.id,
                "message" => &commit.message,
                "author" => &commit.author,
                "author_type" => commit.author_type.as_str(),
                "created_at" => commit.created_at,
                "parent_commit_id" => &commit.parent_commit_id,
                "branch_name" => &commit.branch_name,
                "metadata" => serde_json::to_string(&commit.metadata)?,
            },
            Some(&commit.org_id),
        )?;

        let attached = self.write(
            queries::ATTACH_SIGNATURE,
            params! { "id" => &commit.id, "signature" => signature },
            Some(&commit.org_id),
        )?;
        if attached.is_empty() {
            return Err(LedgerError::CommitNotFound(commit.id));
        }

        tracing::debug!(
            "Created commit {} on {}/{}: {}",
            commit.id,
            commit.org_id,
            commit.branch_name,
            commit.message
        );
        Ok(commit.id)
    }

    /// Record an action inside an existing commit
    pub fn create_action(
        &self,
        commit_id: &str,
        input: ActionInput,
        org_id: &str,
    ) -> Result<String, LedgerError> {
        require_org(org_id)?;

        let id = new_id();
        let inserted = self.write(
            queries::INSERT_ACTION,
            params! {
                "id" => &id,
                "commit_id" => commit_id,
                "action_type" => &input.action_type,
                "tool" => &input.tool,
                "entity_type" => &input.entity_type,
                "entity_id" => &input.entity_id,
                "inputs" => serde_json::to_string(&input.inputs)?,
                "outputs" => serde_json::to_string(&input.outputs)?,
                "status" => input.status.as_str(),
                "error_message" => &input.error_message,
                "created_at" => now_millis(),
            },
            Some(org_id),
        )?;

        if inserted.is_empty() {
            return Err(LedgerError::CommitNotFound(commit_id.to_string()));
        }
        Ok(id)
    }

    /// Fetch a commit by id
    pub fn get_commit(&self, commit_id: &str) -> Result<Option<Commit>, LedgerError> {
        let records = self.read(queries::SELECT_COMMIT, params! { "id" => commit_id }, None)?;
        records.first().map(rows::commit_from_record).transpose()
    }

    /// Actions recorded in a commit, oldest first
    pub fn commit_actions(&self, commit_id: &str) -> Result<Vec<Action>, LedgerError> {
        let records = self.read(
            queries::SELECT_COMMIT_ACTIONS,
            params! { "commit_id" => commit_id },
            None,
        )?;
        records.iter().map(rows::action_from_record).collect()
    }

    /// Most recent commit on a branch
    pub fn branch_head(&self, org_id: &str, branch_name: &str) -> Result<Option<Commit>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_BRANCH_HEAD,
            params! { "branch_name" => branch_name },
            Some(org_id),
        )?;
        records.first().map(rows::commit_from_record).transpose()
    }

    /// Walk the parent chain back from the branch head, newest first
    pub fn commit_history(
        &self,
        org_id: &str,
        branch_name: &str,
        limit: usize,
    ) -> Result<Vec<Commit>, LedgerError> {
        let mut history = Vec::new();
        let mut next = self.branch_head(org_id, branch_name)?;

        while let Some(commit) = next {
            if history.len() >= limit {
                break;
            }
            next = match &commit.parent_commit_id {
                Some(parent_id) => self
                    .get_commit(parent_id)?
                    .filter(|parent| parent.org_id == org_id),
                None => None,
            };
            history.push(commit);
        }

        Ok(history)
    }

    /// Verify a commit's signature against its stored content
    ///
    /// Returns `Ok(false)` for unsigned, undecodable or tampered commits and
    /// `Err(CommitNotFound)` when no such commit exists.
    pub fn validate_commit(&self, commit_id: &str) -> Result<bool, LedgerError> {
        let records = self.read(queries::SELECT_COMMIT, params! { "id" => commit_id }, None)?;
        let Some(record) = records.first() else {
            return Err(LedgerError::CommitNotFound(commit_id.to_string()));
        };

        let commit = match rows::commit_from_record(record) {
            Ok(commit) => commit,
            Err(e) => {
                tracing::warn!("Commit {} could not be decoded: {}", commit_id, e);
                return Ok(false);
            }
        };
        let Some(signature) = commit.signature.as_deref() else {
            return Ok(false);
        };
        let Ok(canonical) = CanonicalCommit::of(&commit).to_json() else {
            return Ok(false);
        };

        Ok(self.signer.verify(&canonical, signature))
    }

    /// Verify the most recent `limit` commits of an organisation
    ///
    /// One bad commit never stops the audit.
    pub fn audit_commits(&self, org_id: &str, limit: usize) -> Result<AuditReport, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_ORG_COMMITS,
            params! { "limit" => limit },
            Some(org_id),
        )?;

        let mut report = AuditReport::default();
        for commit_id in rows::ids(&records) {
            report.checked += 1;
            match self.validate_commit(&commit_id) {
                Ok(true) => {}
                Ok(false) => report.invalid.push(commit_id),
                Err(e) => {
                    tracing::warn!("Audit could not check commit {}: {}", commit_id, e);
                    report.invalid.push(commit_id);
                }
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                "Audit of {} found {} invalid commits out of {}",
                org_id,
                report.invalid.len(),
                report.checked
            );
        }
        Ok(report)
    }

    /// Record a cross-layer validation sweep as a system commit
    pub fn record_validation_event(&self, event: &ValidationEvent) -> Result<String, LedgerError> {
        let summary = serde_json::to_value(event)?;
        let commit_id = self.create_commit(
            CommitInput::new(
                &event.org_id,
                format!(
                    "Cross-layer validation: {} violations found, {} repaired",
                    event.violations_found, event.violations_repaired
                ),
                ENGINE_AUTHOR,
                AuthorType::System,
            )
            .on_branch(&self.config.system_branch)
            .with_metadata(summary.clone()),
        )?;

        self.create_action(
            &commit_id,
            ActionInput::success(
                "VALIDATE_CROSS_LAYER",
                ENGINE_AUTHOR,
                "Organization",
                &event.org_id,
            )
            .with_outputs(summary),
            &event.org_id,
        )?;

        Ok(commit_id)
    }

    // ------------------------------------------------------------------
    // Entity versions
    // ------------------------------------------------------------------

    /// Return the version holding `properties`, creating it if needed
    ///
    /// Identical content is deduplicated by hash. Otherwise the open version
    /// is closed and the new one opened in one transaction; if another writer
    /// replaced the open version in between, [`LedgerError::Conflict`] is
    /// returned and nothing is written.
    pub fn create_or_get_version(
        &self,
        org_id: &str,
        entity_id: &str,
        entity_type: &str,
        properties: &Value,
        commit_id: &str,
    ) -> Result<String, LedgerError> {
        require_org(org_id)?;

        let serialized = serde_json::to_string(properties)?;
        let content_hash = self.signer.hash(&serialized);

        let existing = self.read(
            queries::SELECT_VERSION_BY_HASH,
            params! { "entity_id" => entity_id, "content_hash" => &content_hash },
            Some(org_id),
        )?;
        if let Some(version_id) = existing.first().and_then(|r| r.str_field("id")) {
            tracing::debug!("Entity {} unchanged, reusing version {}", entity_id, version_id);
            return Ok(version_id.to_string());
        }

        let open = self.read(
            queries::SELECT_OPEN_VERSION_ID,
            params! { "entity_id" => entity_id },
            Some(org_id),
        )?;
        let prior_id = open.first().and_then(|r| r.str_field("id")).map(str::to_string);

        let id = new_id();
        let now = now_millis();
        let mut statements = Vec::with_capacity(2);
        if let Some(prior_id) = &prior_id {
            statements.push(
                Statement::new(
                    queries::CLOSE_VERSION,
                    params! { "prior_id" => prior_id, "now" => now, "commit_id" => commit_id },
                )
                .guard(),
            );
        }
        statements.push(
            Statement::new(
                queries::INSERT_VERSION_IF_NONE_OPEN,
                params! {
                    "id" => &id,
                    "entity_id" => entity_id,
                    "entity_type" => entity_type,
                    "properties" => serialized,
                    "now" => now,
                    "commit_id" => commit_id,
                    "content_hash" => content_hash,
                },
            )
            .guard(),
        );

        match self.transaction(statements, org_id)? {
            TxOutcome::Committed(_) => {
                tracing::debug!(
                    "Entity {} now at version {} (closed {:?})",
                    entity_id,
                    id,
                    prior_id
                );
                Ok(id)
            }
            TxOutcome::Aborted { statement } => {
                tracing::warn!(
                    "Version write for {} aborted at statement {}: open version changed concurrently",
                    entity_id,
                    statement
                );
                Err(LedgerError::Conflict(entity_id.to_string()))
            }
        }
    }

    /// Properties of the version valid at `timestamp`
    ///
    /// Validity intervals are half-open: a version closed at `t` is not
    /// visible at `t`.
    pub fn get_entity_at_time(
        &self,
        entity_id: &str,
        timestamp: Timestamp,
        org_id: &str,
    ) -> Result<Option<Value>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_VERSION_AT,
            params! { "entity_id" => entity_id, "ts" => timestamp },
            Some(org_id),
        )?;
        Ok(records.first().map(|r| r.json_field("properties")))
    }

    /// The open version of an entity
    pub fn current_version(
        &self,
        org_id: &str,
        entity_id: &str,
    ) -> Result<Option<EntityVersion>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_CURRENT_VERSION,
            params! { "entity_id" => entity_id },
            Some(org_id),
        )?;
        records.first().map(rows::version_from_record).transpose()
    }

    /// Every version of an entity, oldest first
    pub fn entity_history(&self, org_id: &str, entity_id: &str) -> Result<Vec<EntityVersion>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_ENTITY_HISTORY,
            params! { "entity_id" => entity_id },
            Some(org_id),
        )?;
        records.iter().map(rows::version_from_record).collect()
    }

    // ------------------------------------------------------------------
    // Edge facts
    // ------------------------------------------------------------------

    fn edge_fact_params(commit_id: &str, input: &EdgeFactInput, id: &str, now: Timestamp) -> Result<Params, LedgerError> {
        Ok(params! {
            "id" => id,
            "commit_id" => commit_id,
            "type" => &input.edge_type,
            "from_id" => &input.from_id,
            "to_id" => &input.to_id,
            "from_type" => &input.from_type,
            "to_type" => &input.to_type,
            "props" => serde_json::to_string(&input.props)?,
            "now" => now,
        })
    }

    fn edge_fact_action(&self, action_type: &str, fact_id: &str, input: &EdgeFactInput) -> ActionInput {
        ActionInput::success(action_type, &self.config.tool_name, "EdgeFact", fact_id).with_inputs(json!({
            "type": input.edge_type,
            "from_id": input.from_id,
            "to_id": input.to_id,
            "props": input.props,
        }))
    }

    /// Create an edge fact under its own commit
    ///
    /// Functional uniqueness is not enforced here; use
    /// [`replace_edge_fact`](Self::replace_edge_fact) for functional relations.
    pub fn create_edge_fact(
        &self,
        org_id: &str,
        user_id: &str,
        input: EdgeFactInput,
    ) -> Result<String, LedgerError> {
        let commit_id = self.create_commit(CommitInput::new(
            org_id,
            format!("Created relationship: {}", input.edge_type),
            user_id,
            AuthorType::User,
        ))?;

        let id = self.record_edge_fact_in_commit(&commit_id, org_id, &input)?;
        self.create_action(
            &commit_id,
            self.edge_fact_action("CREATE_EDGE_FACT", &id, &input),
            org_id,
        )?;

        tracing::info!(
            "Created {} fact {} ({} -> {})",
            input.edge_type,
            id,
            input.from_id,
            input.to_id
        );
        Ok(id)
    }

    /// Insert an edge fact covered by an existing commit
    pub fn record_edge_fact_in_commit(
        &self,
        commit_id: &str,
        org_id: &str,
        input: &EdgeFactInput,
    ) -> Result<String, LedgerError> {
        require_org(org_id)?;
        let id = new_id();
        let inserted = self.write(
            queries::INSERT_EDGE_FACT,
            Self::edge_fact_params(commit_id, input, &id, now_millis())?,
            Some(org_id),
        )?;
        if inserted.is_empty() {
            return Err(LedgerError::CommitNotFound(commit_id.to_string()));
        }
        Ok(id)
    }

    /// Close any open fact of the same type from the same source, then create
    /// the new one, under its own commit
    pub fn replace_edge_fact(
        &self,
        org_id: &str,
        user_id: &str,
        input: EdgeFactInput,
    ) -> Result<EdgeFactReplacement, LedgerError> {
        let commit_id = self.create_commit(CommitInput::new(
            org_id,
            format!("Replaced relationship: {}", input.edge_type),
            user_id,
            AuthorType::User,
        ))?;

        let replacement = self.replace_edge_fact_in_commit(&commit_id, org_id, &input)?;
        self.create_action(
            &commit_id,
            self.edge_fact_action("REPLACE_EDGE_FACT", &replacement.id, &input)
                .with_outputs(json!({ "ended": replacement.ended })),
            org_id,
        )?;
        Ok(replacement)
    }

    /// Close-then-create in one transaction, covered by an existing commit
    pub fn replace_edge_fact_in_commit(
        &self,
        commit_id: &str,
        org_id: &str,
        input: &EdgeFactInput,
    ) -> Result<EdgeFactReplacement, LedgerError> {
        require_org(org_id)?;
        let id = new_id();
        let params = Self::edge_fact_params(commit_id, input, &id, now_millis())?;

        let statements = vec![
            Statement::new(queries::CLOSE_OPEN_EDGE_FACTS, params.clone()),
            Statement::new(queries::INSERT_EDGE_FACT, params).guard(),
        ];

        match self.transaction(statements, org_id)? {
            TxOutcome::Committed(results) => {
                let ended = results.first().map(rows::ids).unwrap_or_default();
                tracing::debug!(
                    "Replaced {} from {}: new {}, ended {:?}",
                    input.edge_type,
                    input.from_id,
                    id,
                    ended
                );
                Ok(EdgeFactReplacement { id, ended })
            }
            TxOutcome::Aborted { .. } => Err(LedgerError::CommitNotFound(commit_id.to_string())),
        }
    }

    /// End an open edge fact
    ///
    /// Returns `Ok(false)` without writing anything when the fact does not
    /// exist or is already closed.
    pub fn end_edge_fact(&self, fact_id: &str, org_id: &str, user_id: &str) -> Result<bool, LedgerError> {
        require_org(org_id)?;

        let fact = match self.get_edge_fact(org_id, fact_id)? {
            Some(fact) if fact.is_active() => fact,
            _ => {
                tracing::debug!("Edge fact {} is not open, nothing to end", fact_id);
                return Ok(false);
            }
        };

        let commit_id = self.create_commit(CommitInput::new(
            org_id,
            format!("Ended relationship: {}", fact.edge_type),
            user_id,
            AuthorType::User,
        ))?;

        let ended = self.write(
            queries::END_EDGE_FACT,
            params! { "id" => fact_id, "now" => now_millis(), "commit_id" => &commit_id },
            Some(org_id),
        )?;
        if ended.is_empty() {
            return Ok(false);
        }

        self.create_action(
            &commit_id,
            ActionInput::success("END_EDGE_FACT", &self.config.tool_name, "EdgeFact", fact_id),
            org_id,
        )?;
        Ok(true)
    }

    /// Fetch an edge fact by id
    pub fn get_edge_fact(&self, org_id: &str, fact_id: &str) -> Result<Option<EdgeFact>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(queries::SELECT_EDGE_FACT, params! { "id" => fact_id }, Some(org_id))?;
        records.first().map(rows::edge_fact_from_record).transpose()
    }

    /// Open facts from a source, optionally of one type
    pub fn active_edge_facts(
        &self,
        org_id: &str,
        from_id: &str,
        edge_type: Option<&str>,
    ) -> Result<Vec<EdgeFact>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_ACTIVE_EDGE_FACTS,
            params! { "from_id" => from_id, "type" => edge_type },
            Some(org_id),
        )?;
        records.iter().map(rows::edge_fact_from_record).collect()
    }

    /// Facts of one type from a source that were valid at `timestamp`
    pub fn edge_facts_at_time(
        &self,
        org_id: &str,
        from_id: &str,
        edge_type: &str,
        timestamp: Timestamp,
    ) -> Result<Vec<EdgeFact>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_EDGE_FACTS_AT,
            params! { "from_id" => from_id, "type" => edge_type, "ts" => timestamp },
            Some(org_id),
        )?;
        records.iter().map(rows::edge_fact_from_record).collect()
    }

    /// Every fact of one type from a source, oldest first
    pub fn edge_fact_history(
        &self,
        org_id: &str,
        from_id: &str,
        edge_type: &str,
    ) -> Result<Vec<EdgeFact>, LedgerError> {
        require_org(org_id)?;
        let records = self.read(
            queries::SELECT_EDGE_FACT_HISTORY,
            params! { "from_id" => from_id, "type" => edge_type },
            Some(org_id),
        )?;
        records.iter().map(rows::edge_fact_from_record).collect()
    }
}
