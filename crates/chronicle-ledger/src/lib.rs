//! Chronicle Ledger
//!
//! Signed, append-only provenance history for the temporal graph.
//!
//! # Overview
//!
//! The ledger is responsible for:
//! - **Commits**: who changed what and why, signed with Ed25519 at creation
//! - **Actions**: the individual operations a commit covers
//! - **Entity versions**: content-addressed snapshots with half-open validity intervals
//! - **Edge facts**: bitemporal relationships that are ended, never deleted
//! - **Taxonomy**: file classifications recorded as `CLASSIFIED_AS` facts
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chronicle_domain::{AuthorType, CommitInput};
//! use chronicle_ledger::{LedgerConfig, ProvenanceLedger};
//! use chronicle_store::SqliteGraphStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteGraphStore::new("chronicle.db")?);
//! let ledger = ProvenanceLedger::from_config(store, LedgerConfig::from_file("ledger.toml")?);
//!
//! let commit_id = ledger.create_commit(CommitInput::new(
//!     "org-1",
//!     "Import scene list",
//!     "user-1",
//!     AuthorType::User,
//! ))?;
//! assert!(ledger.validate_commit(&commit_id)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! signing_secret = "..."
//! link_parent_commits = true
//! tool_name = "provenance"
//! system_branch = "main"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod ledger;
mod queries;
mod rows;
mod signer;
mod taxonomy;

pub use config::{ConfigError, LedgerConfig};
pub use error::LedgerError;
pub use ledger::{AuditReport, EdgeFactReplacement, ProvenanceLedger, ValidationEvent, ENGINE_AUTHOR};
pub use signer::Ed25519Signer;
pub use taxonomy::{ClassificationInput, Classifier, SlotMatch, TaxonomyRecorder, CLASSIFIED_AS};
