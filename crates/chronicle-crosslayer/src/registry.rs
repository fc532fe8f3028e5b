//! Rule registry
//!
//! Rules are evaluated in registration order. They are registered at startup
//! and toggled afterwards; end users never author them.

use crate::EngineError;
use chronicle_domain::CrossLayerRule;

/// Ordered set of cross-layer rules
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<CrossLayerRule>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `rules` in order
    pub fn from_rules(rules: impl IntoIterator<Item = CrossLayerRule>) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule);
        }
        registry
    }

    /// Add a rule, replacing one with the same id in place
    pub fn register(&mut self, rule: CrossLayerRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Switch a rule on
    pub fn enable(&mut self, rule_id: &str) -> Result<(), EngineError> {
        self.set_enabled(rule_id, true)
    }

    /// Switch a rule off
    pub fn disable(&mut self, rule_id: &str) -> Result<(), EngineError> {
        self.set_enabled(rule_id, false)
    }

    fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<(), EngineError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Look up a rule by id
    pub fn get(&self, rule_id: &str) -> Option<&CrossLayerRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    /// Enabled rules in registration order
    pub fn enabled(&self) -> impl Iterator<Item = &CrossLayerRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// All rules in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CrossLayerRule> {
        self.rules.iter()
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
