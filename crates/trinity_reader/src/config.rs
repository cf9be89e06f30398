//! Reader configuration

use serde::{Deserialize, Serialize};

/// Object construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Milliseconds per frame spent constructing object graphs
    pub construct_budget_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            construct_budget_ms: 10,
        }
    }
}

impl ReaderConfig {
    /// Set the construction budget
    pub fn with_construct_budget_ms(mut self, millis: u64) -> Self {
        self.construct_budget_ms = millis;
        self
    }
}
