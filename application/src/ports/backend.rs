//! Backend lifecycle contract
//!
//! A backend names a resource type and exposes operations. The lifecycle
//! hooks are optional and independent, so they are modeled as separate
//! capability traits rather than default no-op overrides on one base trait:
//! the executor checks capability presence via the `as_*` accessors.
//!
//! | Capability | Scope | When it runs |
//! |------------|-------|--------------|
//! | [`Warmable`] | process-wide | once, eagerly at startup or before first use |
//! | [`Shutdownable`] | process-wide | orchestrated shutdown only |
//! | [`SessionScoped`] | per-session | session create / destroy |
//!
//! A backend with none of the session hooks still runs its operations, just
//! without a session (shared, global-only resources).

use async_trait::async_trait;
use sandbox_domain::{CapabilityConfig, OperationDef, SessionState, ToolError};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by backend lifecycle hooks.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("session initialization failed: {0}")]
    Init(String),

    #[error("session cleanup failed: {0}")]
    Cleanup(String),

    #[error("warmup failed: {0}")]
    Warmup(String),

    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

impl BackendError {
    /// Convert into the envelope error taxonomy.
    pub fn into_tool_error(self) -> ToolError {
        match self {
            BackendError::Init(msg) => ToolError::session_init_failed(msg),
            BackendError::Warmup(msg) => {
                ToolError::backend_not_warm("backend").with_details(msg)
            }
            other => ToolError::internal(other.to_string()),
        }
    }
}

/// Process-wide, one-time resource preparation (shared models, pools).
#[async_trait]
pub trait Warmable: Send + Sync {
    async fn warmup(&self) -> Result<(), BackendError>;
}

/// Process-wide teardown, run on explicit service shutdown only — never on
/// ordinary client disconnect.
#[async_trait]
pub trait Shutdownable: Send + Sync {
    async fn shutdown(&self) -> Result<(), BackendError>;
}

/// Per-session allocation and release.
#[async_trait]
pub trait SessionScoped: Send + Sync {
    /// Allocate per-session state. The returned payload is opaque to the
    /// router and handed back to operations and to [`cleanup`](Self::cleanup).
    async fn initialize(
        &self,
        worker_id: &str,
        config: &CapabilityConfig,
    ) -> Result<SessionState, BackendError>;

    /// Release per-session state. Runs exactly once per created session,
    /// even when the operation that used it failed.
    async fn cleanup(&self, worker_id: &str, state: SessionState) -> Result<(), BackendError>;
}

/// A named provider of operations, with zero or more lifecycle capabilities.
pub trait Backend: Send + Sync {
    /// The resource type this backend owns; used as the namespace prefix of
    /// its operation names.
    fn resource_type(&self) -> &str;

    /// The operations to register, built explicitly at construction time.
    fn operations(self: Arc<Self>) -> Vec<OperationDef>;

    fn as_warmable(&self) -> Option<&dyn Warmable> {
        None
    }

    fn as_shutdownable(&self) -> Option<&dyn Shutdownable> {
        None
    }

    fn as_session_scoped(&self) -> Option<&dyn SessionScoped> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_domain::{ErrorCode, ToolContext};
    use serde_json::json;

    struct Bare;

    impl Backend for Bare {
        fn resource_type(&self) -> &str {
            "bare"
        }

        fn operations(self: Arc<Self>) -> Vec<OperationDef> {
            vec![OperationDef::new("ping", "liveness", |_ctx: ToolContext| async {
                Ok(json!("pong"))
            })]
        }
    }

    #[test]
    fn test_capabilities_default_to_none() {
        let backend = Bare;
        assert!(backend.as_warmable().is_none());
        assert!(backend.as_shutdownable().is_none());
        assert!(backend.as_session_scoped().is_none());
    }

    #[test]
    fn test_error_mapping() {
        let err = BackendError::Init("no capacity".into()).into_tool_error();
        assert_eq!(err.code, ErrorCode::SessionInitFailed);

        let err = BackendError::Warmup("model load failed".into()).into_tool_error();
        assert_eq!(err.code, ErrorCode::BackendNotWarm);

        let err = BackendError::Cleanup("leak".into()).into_tool_error();
        assert_eq!(err.code, ErrorCode::Internal);
    }
}
