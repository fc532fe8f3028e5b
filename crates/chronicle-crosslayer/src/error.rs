//! Error types for cross-layer validation

use chronicle_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur during cross-layer operations
///
/// A repair that fails for one violation is not an error: it is logged and
/// reported as [`RepairOutcome::Failed`](crate::RepairOutcome::Failed).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or blank organisation id
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// A link endpoint does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// No rule registered under this id
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// Provenance write failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
