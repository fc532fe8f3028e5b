//! Semantic layers of the domain model

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four semantic layers rules are written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Physical reality: locations, shoot days, people (IRL)
    Reality,
    /// Creative intent: ideas, scenes, content clusters
    Creative,
    /// Operations: files, tasks, schedules (Ops)
    Operations,
    /// Provenance: commits, versions, edge facts
    Provenance,
}

impl Layer {
    /// Get the layer name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Reality => "reality",
            Layer::Creative => "creative",
            Layer::Operations => "operations",
            Layer::Provenance => "provenance",
        }
    }

    /// Parse a layer, accepting the short aliases used in rule files
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reality" | "irl" => Some(Layer::Reality),
            "creative" | "idea" => Some(Layer::Creative),
            "operations" | "ops" => Some(Layer::Operations),
            "provenance" => Some(Layer::Provenance),
            _ => None,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardinality of a cross-layer relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// `1:1`
    #[serde(rename = "1:1")]
    OneToOne,
    /// `1:N`
    #[serde(rename = "1:N")]
    OneToMany,
    /// `N:1`
    #[serde(rename = "N:1")]
    ManyToOne,
    /// `N:N`
    #[serde(rename = "N:N")]
    ManyToMany,
}

impl Cardinality {
    /// Get the cardinality in `a:b` notation
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToOne => "N:1",
            Cardinality::ManyToMany => "N:N",
        }
    }

    /// Whether each source entity links to at most one target
    pub fn is_functional(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }
}
