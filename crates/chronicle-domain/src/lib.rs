//! Chronicle Domain Layer
//!
//! Core vocabulary of the temporal provenance graph: the append-only history
//! records (commits, actions, entity versions, edge facts), the semantic layers
//! cross-layer rules are written against, and the trait seams every
//! infrastructure crate implements.
//!
//! ## Key Concepts
//!
//! - **Commit**: who changed what, why and when; signed at creation
//! - **Action**: one operation performed inside a commit
//! - **EntityVersion**: immutable snapshot of an entity's properties with a validity interval
//! - **EdgeFact**: a bitemporal, typed relationship carrying validity and provenance
//! - **CrossLayerRule**: declarative constraint between two semantic layers
//!
//! ## Architecture
//!
//! This crate holds no infrastructure. Storage, signing and scheduling live in
//! other crates behind the traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commit;
pub mod edge_fact;
pub mod layer;
pub mod record;
pub mod rule;
pub mod time;
pub mod traits;
pub mod version;

// Re-exports for convenience
pub use commit::{Action, ActionInput, ActionStatus, AuthorType, Commit, CommitInput, DEFAULT_BRANCH};
pub use edge_fact::{EdgeFact, EdgeFactInput};
pub use layer::{Cardinality, Layer};
pub use record::{Params, Record, RecordExt, RecordSet};
pub use rule::{CrossLayerRule, RepairPlan};
pub use time::{now_millis, Timestamp};
pub use traits::{AccessMode, GraphStore, Signer, Statement, TransientError, TxOutcome};
pub use version::EntityVersion;

/// Generate a fresh record identifier (UUIDv4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reject a blank organisation id
///
/// Every write in the provenance graph is tenant scoped, so callers check
/// this before touching the store.
pub fn is_valid_org_id(org_id: &str) -> bool {
    !org_id.trim().is_empty()
}
