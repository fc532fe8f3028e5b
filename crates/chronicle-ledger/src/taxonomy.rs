//! Taxonomy classification recorded as edge facts
//!
//! Matching a file to a taxonomy slot is done elsewhere (the [`Classifier`]
//! seam). This module only records the outcome: each classification closes
//! the file's previous `CLASSIFIED_AS` fact and opens a new one, so the full
//! classification history stays queryable.

use crate::error::LedgerError;
use crate::ledger::ProvenanceLedger;
use chronicle_domain::{ActionInput, AuthorType, CommitInput, EdgeFact, EdgeFactInput, GraphStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Relationship type linking a file to its taxonomy slot
pub const CLASSIFIED_AS: &str = "CLASSIFIED_AS";

/// A classifier's verdict for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMatch {
    /// Taxonomy slot the file belongs to
    pub slot_id: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// How the match was made (`rule`, `model`, `manual`, ...)
    pub method: String,
    /// Rule that matched, when `method` is rule based
    pub rule_id: Option<String>,
}

/// What a classifier gets to look at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    /// File being classified
    pub file_id: String,
    /// File name including extension
    pub file_name: String,
    /// MIME type, if known
    pub mime_type: Option<String>,
    /// Storage path, if known
    pub path: Option<String>,
    /// Any further metadata
    #[serde(default)]
    pub metadata: Value,
}

/// Black-box taxonomy matcher
pub trait Classifier: Send + Sync {
    /// Best slot for the input, or `None` when nothing matches
    fn classify(&self, input: &ClassificationInput) -> Option<SlotMatch>;
}

/// Records taxonomy classifications through the ledger
pub struct TaxonomyRecorder<S> {
    ledger: ProvenanceLedger<S>,
}

impl<S: GraphStore> TaxonomyRecorder<S> {
    /// Create a recorder writing through `ledger`
    pub fn new(ledger: ProvenanceLedger<S>) -> Self {
        Self { ledger }
    }

    /// Record that `file_id` now belongs to `slot`, returning the new fact id
    pub fn record_classification(
        &self,
        org_id: &str,
        user_id: &str,
        file_id: &str,
        slot: &SlotMatch,
    ) -> Result<String, LedgerError> {
        let commit_id = self.ledger.create_commit(CommitInput::new(
            org_id,
            format!("Classified file {} as {}", file_id, slot.slot_id),
            user_id,
            AuthorType::User,
        ))?;

        self.ledger.create_action(
            &commit_id,
            ActionInput::success(
                "CLASSIFY_FILE",
                &self.ledger.config().tool_name,
                "File",
                file_id,
            )
            .with_inputs(json!({ "file_id": file_id }))
            .with_outputs(serde_json::to_value(slot)?),
            org_id,
        )?;

        let input = EdgeFactInput::new(CLASSIFIED_AS, file_id, &slot.slot_id)
            .with_types("File", "TaxonomySlot")
            .with_props(json!({
                "confidence": slot.confidence,
                "method": slot.method,
                "rule_id": slot.rule_id,
            }));
        let replacement = self
            .ledger
            .replace_edge_fact_in_commit(&commit_id, org_id, &input)?;

        tracing::info!(
            "Classified {} as {} ({:.2} via {}), ended {} previous",
            file_id,
            slot.slot_id,
            slot.confidence,
            slot.method,
            replacement.ended.len()
        );
        Ok(replacement.id)
    }

    /// Run the classifier and record its verdict
    ///
    /// Nothing is written when the classifier finds no match.
    pub fn classify_file(
        &self,
        org_id: &str,
        user_id: &str,
        input: &ClassificationInput,
        classifier: &dyn Classifier,
    ) -> Result<Option<String>, LedgerError> {
        match classifier.classify(input) {
            Some(slot) => self
                .record_classification(org_id, user_id, &input.file_id, &slot)
                .map(Some),
            None => {
                tracing::debug!("No taxonomy slot matched {}", input.file_id);
                Ok(None)
            }
        }
    }

    /// The file's open classification
    pub fn current_classification(&self, org_id: &str, file_id: &str) -> Result<Option<EdgeFact>, LedgerError> {
        Ok(self
            .ledger
            .active_edge_facts(org_id, file_id, Some(CLASSIFIED_AS))?
            .into_iter()
            .next())
    }

    /// Every classification the file has had, oldest first
    pub fn classification_history(&self, org_id: &str, file_id: &str) -> Result<Vec<EdgeFact>, LedgerError> {
        self.ledger.edge_fact_history(org_id, file_id, CLASSIFIED_AS)
    }
}
