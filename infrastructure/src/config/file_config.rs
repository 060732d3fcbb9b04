//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; every section has sensible defaults so a
//! missing file still yields a runnable configuration.

use sandbox_domain::CapabilityConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("server.port cannot be 0")]
    InvalidPort,

    #[error("server.session_ttl_seconds cannot be 0")]
    InvalidTtl,

    #[error("server.call_timeout_seconds cannot be 0")]
    InvalidCallTimeout,
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub port: u16,
    /// Idle session time-to-live in seconds
    pub session_ttl_seconds: u64,
    /// Per-call execution timeout in seconds
    pub call_timeout_seconds: u64,
    /// TTL sweep interval in seconds
    pub sweep_interval_seconds: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 8700,
            session_ttl_seconds: 600,
            call_timeout_seconds: 300,
            sweep_interval_seconds: 60,
        }
    }
}

/// One `[resources.<type>]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSection {
    /// Whether this resource type is registered at startup
    pub enabled: bool,
    /// Name of the compiled-in backend implementation serving this type
    pub implementation: Option<String>,
    /// Default capability config merged under per-session overrides
    pub config: CapabilityConfig,
}

impl Default for ResourceSection {
    fn default() -> Self {
        Self {
            enabled: true,
            implementation: None,
            config: CapabilityConfig::new(),
        }
    }
}

/// `[apis]` section: one config block per stateless tool, keyed by the
/// identifier the tool declares at registration.
pub type ApisSection = BTreeMap<String, CapabilityConfig>;

/// Whole configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub resources: BTreeMap<String, ResourceSection>,
    pub apis: ApisSection,
    /// Resource types to warm up eagerly at startup
    pub warmup: Vec<String>,
}

impl FileConfig {
    /// Validate invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }
        if self.server.session_ttl_seconds == 0 {
            return Err(ConfigValidationError::InvalidTtl);
        }
        if self.server.call_timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidCallTimeout);
        }
        Ok(())
    }

    /// Default config block for a resource type, when declared and enabled.
    pub fn resource_config(&self, resource_type: &str) -> Option<&CapabilityConfig> {
        self.resources
            .get(resource_type)
            .filter(|section| section.enabled)
            .map(|section| &section.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1");
        assert_eq!(config.server.port, 8700);
        assert_eq!(config.server.session_ttl_seconds, 600);
        assert!(config.resources.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = FileConfig::default();
        config.server.session_ttl_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidTtl)
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_str = r#"
            warmup = ["browser"]

            [server]
            port = 9001
            session_ttl_seconds = 120

            [resources.browser]
            enabled = true
            implementation = "process_pool"
            config = { headless = true, width = 1280 }

            [resources.vm]
            enabled = false

            [apis.web_search]
            api_key = "k"
        "#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.call_timeout_seconds, 300);
        assert!(config.resource_config("browser").is_some());
        assert_eq!(
            config.resources["browser"].implementation.as_deref(),
            Some("process_pool")
        );
        // Disabled resources report no config
        assert!(config.resource_config("vm").is_none());
        assert!(config.resources["vm"].implementation.is_none());
        assert_eq!(config.warmup, vec!["browser"]);
        assert_eq!(
            config.apis["web_search"].get("api_key"),
            Some(&serde_json::json!("k"))
        );
    }
}
