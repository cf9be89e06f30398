//! Context configuration
//!
//! ```json
//! {
//!     "registry": { "prepare_budget_ms": 8, "path_prefixes": { "res": "assets" } },
//!     "reader": { "construct_budget_ms": 4 }
//! }
//! ```
//!
//! Every key is optional; missing ones take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use trinity_reader::ReaderConfig;
use trinity_resource::RegistryConfig;

use crate::error::{Error, Result};

/// Configuration of a [`Context`](crate::Context)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrinityConfig {
    /// Resource registry settings
    pub registry: RegistryConfig,
    /// Object construction settings
    pub reader: ReaderConfig,
}

impl TrinityConfig {
    /// Streaming preset: small per-frame budgets, aggressive purging
    pub fn streaming() -> Self {
        Self {
            registry: RegistryConfig::streaming(),
            reader: ReaderConfig::default().with_construct_budget_ms(4),
        }
    }

    /// Tools preset: nothing is purged, CPU geometry kept
    pub fn tools() -> Self {
        Self {
            registry: RegistryConfig::tools(),
            reader: ReaderConfig::default(),
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_json_str(&source)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Serialize as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let config = TrinityConfig::from_json_str(
            r#"{ "registry": { "prepare_budget_ms": 8, "path_prefixes": { "res": "assets" } } }"#,
        )
        .unwrap();

        assert_eq!(config.registry.prepare_budget_ms, 8);
        assert_eq!(config.registry.idle_frame_limit, RegistryConfig::default().idle_frame_limit);
        assert_eq!(config.registry.path_prefixes.get("res").map(String::as_str), Some("assets"));
        assert_eq!(config.reader, ReaderConfig::default());
    }

    #[test]
    fn test_round_trip_and_errors() {
        let config = TrinityConfig::streaming();
        let json = config.to_json_string().unwrap();
        assert_eq!(TrinityConfig::from_json_str(&json).unwrap(), config);

        assert!(matches!(TrinityConfig::from_json_str("{ nope"), Err(Error::Config(_))));
        assert!(matches!(
            TrinityConfig::load("/definitely/not/here.json"),
            Err(Error::Io { .. })
        ));
    }
}
