//! Response envelope — the uniform wire format of every invocation
//!
//! Success and failure share one shape: a numeric code, a message, an
//! optional business payload and execution metadata. Every envelope carries
//! a `trace_id` so a single request can be correlated across logs even when
//! it failed.

use crate::tool::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution metadata attached to every envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Resolved full name of the invoked operation
    pub tool: String,
    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: f64,
    /// Resource type of the operation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Session used for the call, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Correlation id, unique per request
    pub trace_id: String,
}

impl EnvelopeMeta {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            execution_time_ms: 0.0,
            resource_type: None,
            session_id: None,
            trace_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Uniform response structure returned by every operation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// `0` success, `4000-4999` caller error, `5000-5999` provider error
    pub code: i32,
    /// Human-readable outcome message
    pub message: String,
    /// Business payload, provider-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Execution metadata
    pub meta: EnvelopeMeta,
}

impl Envelope {
    /// A successful envelope.
    pub fn success(data: Option<Value>, meta: EnvelopeMeta) -> Self {
        Self {
            code: 0,
            message: "ok".to_string(),
            data,
            meta,
        }
    }

    /// A failed envelope carrying the taxonomy code of `error`.
    pub fn failure(error: &ToolError, meta: EnvelopeMeta) -> Self {
        Self {
            code: error.code.value(),
            message: match &error.details {
                Some(details) => format!("{} ({details})", error.message),
                None => error.message.clone(),
            },
            data: None,
            meta,
        }
    }

    /// A failed envelope that still carries a payload (batch aggregates).
    pub fn failure_with_data(error: &ToolError, data: Value, meta: EnvelopeMeta) -> Self {
        let mut envelope = Self::failure(error, meta);
        envelope.data = Some(data);
        envelope
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let envelope = Envelope::success(Some(json!({"text": "hi"})), EnvelopeMeta::new("echo"));
        assert!(envelope.is_success());
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.meta.tool, "echo");
        assert!(!envelope.meta.trace_id.is_empty());
    }

    #[test]
    fn test_failure_envelope_carries_trace_id() {
        let err = ToolError::unknown_tool("nope");
        let envelope = Envelope::failure(&err, EnvelopeMeta::new("nope"));
        assert!(!envelope.is_success());
        assert_eq!(envelope.code, 4001);
        assert!(!envelope.meta.trace_id.is_empty());
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let a = EnvelopeMeta::new("a");
        let b = EnvelopeMeta::new("a");
        assert_ne!(a.trace_id, b.trace_id);
    }

    #[test]
    fn test_serialization_shape() {
        let envelope = Envelope::success(None, EnvelopeMeta::new("echo"));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["code"], json!(0));
        assert!(value.get("data").is_none());
        assert!(value["meta"]["trace_id"].is_string());
    }
}
