//! Ledger error types

use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Missing or blank organisation id; rejected before any write
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// Referenced commit does not exist
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    /// Another writer replaced the open version first
    #[error("Concurrent modification of {0}")]
    Conflict(String),

    /// Storage layer error
    #[error("Store error: {0}")]
    Store(String),

    /// Stored row could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
