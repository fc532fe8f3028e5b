//! Error types for graph store operations

use chronicle_domain::TransientError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A write statement was submitted in read mode
    #[error("Statement is not read-only but was run in READ mode: {0}")]
    AccessMode(String),

    /// The query references a parameter the caller did not supply
    #[error("Missing query parameter: {0}")]
    MissingParameter(String),

    /// The connection mutex was poisoned by a panicking writer
    #[error("Connection lock poisoned")]
    Lock,

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl TransientError for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
