//! Tool domain entities — operation definitions and invocation contexts
//!
//! Operations are registered explicitly: a backend (or a stateless tool)
//! constructs [`OperationDef`]s with a builder and hands them to the
//! registry at startup. There is no runtime scanning.

use super::error::ToolError;
use super::schema::ParamSpec;
use crate::session::state::SessionState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by an operation handler.
pub type OperationFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

/// Type-erased async operation handler.
pub type OperationHandler = Arc<dyn Fn(ToolContext) -> OperationFuture + Send + Sync>;

/// A single invocation request as it arrives over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Operation name: either a bare simple name or `resource_type:operation`
    pub action: String,
    /// Call parameters
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
    /// Identifier of the calling worker
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

/// Worker id used when a request does not name one. Shared with the wire
/// protocol so every surface defaults the same way.
pub fn default_worker_id() -> String {
    "default".to_string()
}

impl InvokeRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: serde_json::Map::new(),
            worker_id: default_worker_id(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }
}

/// Session identifiers and state injected into a stateful operation.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub resource_type: String,
    pub state: SessionState,
}

/// Everything a handler receives for one call.
#[derive(Clone)]
pub struct ToolContext {
    /// Validated parameters, defaults already filled in
    pub params: serde_json::Map<String, Value>,
    /// Identifier of the calling worker
    pub worker_id: String,
    /// Present only for operations owned by a session-scoped backend
    pub session: Option<SessionContext>,
}

impl ToolContext {
    /// Get a string parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer parameter.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }

    /// Get a boolean parameter.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// The session context, or an internal error for operations that were
    /// registered under a session-scoped backend but called without one.
    pub fn require_session(&self) -> Result<&SessionContext, ToolError> {
        self.session
            .as_ref()
            .ok_or_else(|| ToolError::internal("operation requires a session"))
    }
}

/// Definition of one operation: name, declared parameters and handler.
#[derive(Clone)]
pub struct OperationDef {
    /// Simple (unqualified) operation name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Declared parameters, in declaration order
    pub params: Vec<ParamSpec>,
    handler: OperationHandler,
}

impl OperationDef {
    /// Build an operation from an async handler function.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// The type-erased handler.
    pub fn handler(&self) -> OperationHandler {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for OperationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::schema::ParamType;
    use serde_json::json;

    fn context(params: serde_json::Map<String, Value>) -> ToolContext {
        ToolContext {
            params,
            worker_id: "w1".to_string(),
            session: None,
        }
    }

    #[tokio::test]
    async fn test_operation_def_invokes_handler() {
        let op = OperationDef::new("double", "Double a number", |ctx: ToolContext| async move {
            let n = ctx.get_i64("n").unwrap_or(0);
            Ok(json!(n * 2))
        })
        .with_param(ParamSpec::required("n", ParamType::Integer));

        let mut params = serde_json::Map::new();
        params.insert("n".to_string(), json!(21));
        let result = (op.handler())(context(params)).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn test_invoke_request_defaults() {
        let req: InvokeRequest = serde_json::from_value(json!({"action": "echo"})).unwrap();
        assert_eq!(req.worker_id, "default");
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_require_session_without_session() {
        let ctx = context(serde_json::Map::new());
        assert!(ctx.require_session().is_err());
    }
}
