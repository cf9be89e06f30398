//! Registry configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Milliseconds per tick spent draining the prepare queue
    pub prepare_budget_ms: u64,

    /// Frames a good resource may go untouched before it is purged
    pub idle_frame_limit: u64,

    /// Run the idle sweep every this many frames
    pub purge_interval_frames: u64,

    /// Sweep idle resources automatically from `tick`
    pub auto_purge: bool,

    /// Keep a CPU-side copy of geometry after upload
    pub system_mirror: bool,

    /// Url prefix table: `res:/a.png` with `res -> assets` fetches `assets/a.png`
    pub path_prefixes: BTreeMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prepare_budget_ms: 50,
            idle_frame_limit: 600,
            purge_interval_frames: 60,
            auto_purge: true,
            system_mirror: false,
            path_prefixes: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    /// Configuration for streaming scenes: small budget, aggressive purging
    pub fn streaming() -> Self {
        Self {
            prepare_budget_ms: 8,
            idle_frame_limit: 120,
            purge_interval_frames: 30,
            ..Default::default()
        }
    }

    /// Configuration for tools: never purge, keep CPU geometry around
    pub fn tools() -> Self {
        Self {
            auto_purge: false,
            system_mirror: true,
            ..Default::default()
        }
    }

    /// Set the prepare budget
    pub fn with_prepare_budget_ms(mut self, millis: u64) -> Self {
        self.prepare_budget_ms = millis;
        self
    }

    /// Set idle limit and sweep interval
    pub fn with_purge(mut self, idle_frame_limit: u64, purge_interval_frames: u64) -> Self {
        self.idle_frame_limit = idle_frame_limit;
        self.purge_interval_frames = purge_interval_frames;
        self
    }

    /// Map a url prefix to a root
    pub fn with_prefix(mut self, prefix: impl Into<String>, root: impl Into<String>) -> Self {
        self.path_prefixes.insert(prefix.into(), root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{ "prepare_budget_ms": 10, "path_prefixes": { "res": "assets" } }"#)
                .unwrap();

        assert_eq!(config.prepare_budget_ms, 10);
        assert_eq!(config.idle_frame_limit, 600);
        assert_eq!(config.path_prefixes.get("res").map(String::as_str), Some("assets"));
    }

    #[test]
    fn test_presets() {
        assert!(!RegistryConfig::tools().auto_purge);
        assert!(RegistryConfig::streaming().prepare_budget_ms < RegistryConfig::default().prepare_budget_ms);
    }
}
