//! Wire protocol — one JSON request per line, one envelope per line back
//!
//! Every request names its operation in the `op` field; the remaining
//! fields are operation-specific. Responses are always
//! [`Envelope`](sandbox_domain::Envelope)s, success and failure alike.

use sandbox_domain::{CapabilityConfig, InvokeRequest, default_worker_id};
use serde::Deserialize;
use serde_json::Value;

/// A single line received on the invocation surface.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WireRequest {
    /// Invoke one operation.
    Execute {
        action: String,
        #[serde(default)]
        params: serde_json::Map<String, Value>,
        #[serde(default = "default_worker_id")]
        worker_id: String,
    },

    /// Invoke several operations sequentially; the reply aggregates all
    /// per-request envelopes.
    ExecuteBatch { requests: Vec<InvokeRequest> },

    /// Create (or return) the explicit session for a worker and resource
    /// type, with optional config overrides.
    CreateSession {
        #[serde(default = "default_worker_id")]
        worker_id: String,
        resource_type: String,
        #[serde(default)]
        config: Option<CapabilityConfig>,
    },

    /// Destroy the session for a worker and resource type.
    DestroySession {
        #[serde(default = "default_worker_id")]
        worker_id: String,
        resource_type: String,
    },

    /// List live sessions.
    ListSessions,

    /// List registered operations with their declared parameters.
    ListTools,

    /// Liveness and counters.
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_with_defaults() {
        let request: WireRequest =
            serde_json::from_value(json!({"op": "execute", "action": "echo"})).unwrap();
        let WireRequest::Execute {
            action,
            params,
            worker_id,
        } = request
        else {
            panic!("wrong variant");
        };
        assert_eq!(action, "echo");
        assert!(params.is_empty());
        assert_eq!(worker_id, "default");
    }

    #[test]
    fn test_create_session_shape() {
        let request: WireRequest = serde_json::from_value(json!({
            "op": "create_session",
            "worker_id": "w7",
            "resource_type": "browser",
            "config": {"viewport": "1280x720"}
        }))
        .unwrap();
        let WireRequest::CreateSession {
            worker_id,
            resource_type,
            config,
        } = request
        else {
            panic!("wrong variant");
        };
        assert_eq!(worker_id, "w7");
        assert_eq!(resource_type, "browser");
        assert_eq!(config.unwrap()["viewport"], json!("1280x720"));
    }

    #[test]
    fn test_unknown_op_rejected() {
        let result: Result<WireRequest, _> =
            serde_json::from_value(json!({"op": "reboot_world"}));
        assert!(result.is_err());
    }
}
