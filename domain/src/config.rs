//! Capability configuration
//!
//! Providers receive a layered configuration: a static per-provider default
//! block merged with an optional per-session override supplied at
//! session-creation time. The merge is shallow and the override wins.

use serde_json::Value;

/// Configuration block handed to a capability provider.
///
/// Opaque to the orchestration layer; providers interpret the keys.
pub type CapabilityConfig = serde_json::Map<String, Value>;

/// Shallow-merge two config blocks. Keys from `overrides` replace keys from
/// `base`; nested tables are not merged recursively.
pub fn shallow_merge(
    base: Option<&CapabilityConfig>,
    overrides: Option<&CapabilityConfig>,
) -> CapabilityConfig {
    let mut merged = base.cloned().unwrap_or_default();
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
