//! Chronicle Cross-Layer Engine
//!
//! Validates and repairs relationships that must hold between the semantic
//! layers of the domain model.
//!
//! # Overview
//!
//! The engine is responsible for:
//! - **Validation**: running each enabled rule's query, scoped to one organisation
//! - **Repair**: running a rule's repair plan once per violation, in its own transaction
//! - **Linking**: creating cross-layer links as edge facts or plain edges
//! - **Provenance**: recording every sweep as a system commit in the ledger
//!
//! # Layers
//!
//! | Layer | Holds |
//! |-------|-------|
//! | **Reality** | shoot days, locations, shots |
//! | **Creative** | scenes, content clusters |
//! | **Operations** | files, assets, tasks |
//! | **Provenance** | commits, versions, edge facts |
//!
//! # Configuration
//!
//! ```toml
//! [engine]
//! auto_repair = true
//! sweep_interval_minutes = 60
//! org_ids = ["org-1"]
//! disabled_rules = []
//! ```

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod metrics;
mod registry;
mod rules;
mod worker;

pub use config::EngineConfig;
pub use engine::{
    CrossLayerEngine, CrossLayerLinkRequest, EngineState, RepairOutcome, RuleValidationResult,
    Violation,
};
pub use error::EngineError;
pub use metrics::EngineMetrics;
pub use registry::RuleRegistry;
pub use rules::{builtin_rules, ASSET_VERSION, FILE_CLUSTER, SHOT_SCENE};
pub use worker::ValidationWorker;
