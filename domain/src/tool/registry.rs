//! Tool registry — the single name → operation index
//!
//! Populated once at process start from backend operation sets and the
//! declarative stateless-tool table, immutable afterwards.
//!
//! # Name resolution
//!
//! Resolution order is load-bearing and deterministic:
//!
//! 1. Exact match on the full name.
//! 2. Names containing the `:` separator resolve by exact match only.
//! 3. Bare simple names resolve when exactly one entry matches; multiple
//!    matches fail with an ambiguity error listing every candidate — the
//!    registry never guesses.

use super::entities::{OperationDef, OperationHandler};
use super::error::{ErrorCode, ToolError};
use super::schema::ParamSpec;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Separator between a resource type and an operation name.
pub const NAME_SEPARATOR: char = ':';

/// Registry errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    DuplicateName(String),

    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("ambiguous tool name '{name}', candidates: {}", .candidates.join(", "))]
    Ambiguous { name: String, candidates: Vec<String> },
}

impl RegistryError {
    /// Convert into the envelope error taxonomy.
    pub fn into_tool_error(self) -> ToolError {
        match self {
            RegistryError::NotFound(name) => ToolError::unknown_tool(name),
            RegistryError::Ambiguous { .. } => {
                ToolError::new(ErrorCode::AmbiguousToolName, self.to_string())
            }
            RegistryError::DuplicateName(_) => ToolError::internal(self.to_string()),
        }
    }
}

/// One registered operation.
pub struct RegistryEntry {
    /// Globally unique name (`resource:op` for backend operations)
    pub full_name: String,
    /// Unqualified operation name
    pub simple_name: String,
    /// Owning resource type; `None` for stateless tools
    pub resource_type: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Declared parameters
    pub params: Vec<ParamSpec>,
    /// `apis` config section to inject at call time (stateless tools only)
    pub config_key: Option<String>,
    handler: OperationHandler,
}

impl RegistryEntry {
    pub fn handler(&self) -> OperationHandler {
        self.handler.clone()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("full_name", &self.full_name)
            .field("resource_type", &self.resource_type)
            .finish_non_exhaustive()
    }
}

/// Name → operation index. Built once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    by_full_name: HashMap<String, Arc<RegistryEntry>>,
    by_simple_name: HashMap<String, Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every operation of a backend under its resource type.
    pub fn register_backend_operations(
        &mut self,
        resource_type: &str,
        operations: Vec<OperationDef>,
    ) -> Result<(), RegistryError> {
        for op in operations {
            let full_name = format!("{resource_type}{NAME_SEPARATOR}{}", op.name);
            self.insert(RegistryEntry {
                full_name,
                simple_name: op.name.clone(),
                resource_type: Some(resource_type.to_string()),
                description: op.description.clone(),
                params: op.params.clone(),
                config_key: None,
                handler: op.handler(),
            })?;
        }
        Ok(())
    }

    /// Register a stateless tool, remembering which `apis` config section to
    /// inject at call time.
    pub fn register_stateless_tool(
        &mut self,
        op: OperationDef,
        config_key: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.insert(RegistryEntry {
            full_name: op.name.clone(),
            simple_name: op.name.clone(),
            resource_type: None,
            description: op.description.clone(),
            params: op.params.clone(),
            config_key: Some(config_key.into()),
            handler: op.handler(),
        })
    }

    fn insert(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if self.by_full_name.contains_key(&entry.full_name) {
            return Err(RegistryError::DuplicateName(entry.full_name));
        }
        self.by_simple_name
            .entry(entry.simple_name.clone())
            .or_default()
            .push(entry.full_name.clone());
        self.by_full_name
            .insert(entry.full_name.clone(), Arc::new(entry));
        Ok(())
    }

    /// Resolve an operation name to its registry entry.
    pub fn resolve(&self, name: &str) -> Result<Arc<RegistryEntry>, RegistryError> {
        if let Some(entry) = self.by_full_name.get(name) {
            return Ok(Arc::clone(entry));
        }
        // Qualified names are exact-match only
        if name.contains(NAME_SEPARATOR) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        match self.by_simple_name.get(name) {
            Some(full_names) if full_names.len() == 1 => {
                Ok(Arc::clone(&self.by_full_name[&full_names[0]]))
            }
            Some(full_names) => {
                let mut candidates = full_names.clone();
                candidates.sort();
                Err(RegistryError::Ambiguous {
                    name: name.to_string(),
                    candidates,
                })
            }
            None => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// All entries, sorted by full name for stable listings.
    pub fn entries(&self) -> Vec<Arc<RegistryEntry>> {
        let mut entries: Vec<_> = self.by_full_name.values().cloned().collect();
        entries.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        entries
    }

    pub fn len(&self) -> usize {
        self.by_full_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_full_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolContext;
    use serde_json::json;

    fn op(name: &str) -> OperationDef {
        OperationDef::new(name, "test op", |_ctx: ToolContext| async { Ok(json!(null)) })
    }

    fn registry_with_collision() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_backend_operations("browser", vec![op("reset"), op("navigate")])
            .unwrap();
        registry
            .register_backend_operations("vm", vec![op("reset")])
            .unwrap();
        registry
    }

    #[test]
    fn test_full_name_resolution() {
        let registry = registry_with_collision();
        let entry = registry.resolve("browser:reset").unwrap();
        assert_eq!(entry.full_name, "browser:reset");
        assert_eq!(entry.resource_type.as_deref(), Some("browser"));
    }

    #[test]
    fn test_simple_name_resolves_when_unique() {
        let registry = registry_with_collision();
        let entry = registry.resolve("navigate").unwrap();
        assert_eq!(entry.full_name, "browser:navigate");
    }

    #[test]
    fn test_ambiguous_simple_name_lists_candidates() {
        let registry = registry_with_collision();
        let err = registry.resolve("reset").unwrap_err();
        match err {
            RegistryError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, vec!["browser:reset", "vm:reset"]);
            }
            other => panic!("expected ambiguity error, got {other:?}"),
        }
        // Each candidate still resolves individually by full name
        assert!(registry.resolve("browser:reset").is_ok());
        assert!(registry.resolve("vm:reset").is_ok());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry_with_collision();
        let first = registry.resolve("navigate").unwrap().full_name.clone();
        let second = registry.resolve("navigate").unwrap().full_name.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_qualified_names_are_exact_only() {
        let registry = registry_with_collision();
        assert!(matches!(
            registry.resolve("browser:missing"),
            Err(RegistryError::NotFound(_))
        ));
        // A separator in the name never falls back to simple-name lookup
        assert!(matches!(
            registry.resolve("typo:reset"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_name() {
        let registry = registry_with_collision();
        assert!(matches!(
            registry.resolve("nope"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register_stateless_tool(op("echo"), "echo").unwrap();
        let err = registry
            .register_stateless_tool(op("echo"), "echo")
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[test]
    fn test_stateless_tool_entry_shape() {
        let mut registry = ToolRegistry::new();
        registry.register_stateless_tool(op("echo"), "echo").unwrap();
        let entry = registry.resolve("echo").unwrap();
        assert!(entry.resource_type.is_none());
        assert_eq!(entry.config_key.as_deref(), Some("echo"));
        assert_eq!(entry.full_name, entry.simple_name);
    }

    #[test]
    fn test_entries_sorted() {
        let registry = registry_with_collision();
        let names: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| e.full_name.clone())
            .collect();
        assert_eq!(names, vec!["browser:navigate", "browser:reset", "vm:reset"]);
    }
}
