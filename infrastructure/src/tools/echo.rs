//! Echo tool — the smallest possible stateless tool, useful for wiring
//! checks and as a template for new ones.

use sandbox_domain::{OperationDef, ToolContext};
use serde_json::Value;

pub const ECHO: &str = "echo";

/// Returns the caller's parameter object unchanged.
pub fn echo_operation() -> OperationDef {
    OperationDef::new(ECHO, "Echo the given parameters back", |ctx: ToolContext| async move {
        Ok(Value::Object(ctx.params))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_application::SandboxService;
    use sandbox_domain::CapabilityConfig;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_echo_returns_whole_parameter_object() {
        let op = echo_operation();
        let ctx = ToolContext {
            params: params(&[("a", json!(1)), ("b", json!([true, null]))]),
            worker_id: "w1".to_string(),
            session: None,
        };

        let result = (op.handler())(ctx.clone()).await.unwrap();
        assert_eq!(result, Value::Object(ctx.params));
    }

    #[tokio::test]
    async fn test_registered_echo_preserves_data_shape() {
        // The shipped tool, through the real dispatch path: a text parameter
        // comes back wrapped in its object, never as a bare string.
        let service = SandboxService::builder()
            .register_tool(echo_operation(), ECHO, CapabilityConfig::new())
            .unwrap()
            .build();

        let envelope = service
            .execute("echo", params(&[("text", json!("hi"))]), "w1")
            .await;
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data, Some(json!({"text": "hi"})));
        assert_eq!(envelope.meta.tool, "echo");
    }
}
