//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the provenance core and
//! infrastructure. Implementations live in other crates.

use crate::{Params, RecordSet};
use std::fmt;

/// Access mode requested for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read-only; adapters reject statements that would write
    Read,
    /// Read-write
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => f.write_str("READ"),
            AccessMode::Write => f.write_str("WRITE"),
        }
    }
}

/// One parameterized statement inside a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Query text; parameters are referenced as `:name`
    pub query: String,
    /// Named parameters
    pub params: Params,
    /// Abort and roll back the transaction when this statement returns no rows
    pub require_rows: bool,
}

impl Statement {
    /// Create a statement
    pub fn new(query: impl Into<String>, params: Params) -> Self {
        Self {
            query: query.into(),
            params,
            require_rows: false,
        }
    }

    /// Make the statement a guard: zero rows aborts the whole transaction
    pub fn guard(mut self) -> Self {
        self.require_rows = true;
        self
    }
}

/// Result of [`GraphStore::run_in_transaction`]
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome {
    /// All statements ran and the transaction committed
    Committed(Vec<RecordSet>),
    /// A guard statement matched nothing; everything was rolled back
    Aborted {
        /// Index of the guard statement that failed
        statement: usize,
    },
}

impl TxOutcome {
    /// Result sets if the transaction committed
    pub fn committed(self) -> Option<Vec<RecordSet>> {
        match self {
            TxOutcome::Committed(sets) => Some(sets),
            TxOutcome::Aborted { .. } => None,
        }
    }
}

/// Errors that may succeed when retried (connection loss, lock contention)
pub trait TransientError {
    /// Whether retrying the same operation could succeed
    fn is_transient(&self) -> bool;
}

/// Query execution against the graph backend
///
/// Implemented by the infrastructure layer (chronicle-store). When `org_id`
/// is given it is merged into the parameter map as `org_id`; it is never
/// injected into the query text, so queries must reference `:org_id`
/// themselves.
pub trait GraphStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + TransientError + Send + Sync + 'static;

    /// Execute a single statement
    fn run(
        &self,
        query: &str,
        params: Params,
        mode: AccessMode,
        org_id: Option<&str>,
    ) -> Result<RecordSet, Self::Error>;

    /// Execute statements atomically, in order, in one write transaction
    fn run_in_transaction(
        &self,
        statements: Vec<Statement>,
        org_id: Option<&str>,
    ) -> Result<TxOutcome, Self::Error>;
}

/// Signatures over canonical commit content and content hashes
///
/// Implemented by the ledger crate.
pub trait Signer: Send + Sync {
    /// Sign a payload, returning an encoded signature
    fn sign(&self, payload: &str) -> String;

    /// Verify a signature; malformed input yields `false`
    fn verify(&self, payload: &str, signature: &str) -> bool;

    /// Hash arbitrary data for content addressing
    fn hash(&self, data: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_guard() {
        let st = Statement::new("SELECT 1", Params::new());
        assert!(!st.require_rows);
        assert!(st.guard().require_rows);
    }

    #[test]
    fn test_tx_outcome_committed() {
        let ok = TxOutcome::Committed(vec![RecordSet::default()]);
        assert_eq!(ok.committed().map(|s| s.len()), Some(1));
        assert!(TxOutcome::Aborted { statement: 0 }.committed().is_none());
    }

    #[test]
    fn test_access_mode_display() {
        assert_eq!(AccessMode::Read.to_string(), "READ");
        assert_eq!(AccessMode::Write.to_string(), "WRITE");
    }
}
