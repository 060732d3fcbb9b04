//! NDJSON-over-TCP invocation surface
//!
//! One connection serves many requests: each line in is one
//! [`WireRequest`], each line out is one [`Envelope`]. A malformed line
//! never drops the connection; it gets a `4000` envelope like any other
//! caller error.

use crate::protocol::WireRequest;
use sandbox_application::SandboxService;
use sandbox_domain::{Envelope, EnvelopeMeta, ToolError};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serialize a management-operation reply into a success envelope.
fn reply<T: Serialize>(op: &str, payload: &T) -> Envelope {
    match serde_json::to_value(payload) {
        Ok(value) => Envelope::success(Some(value), EnvelopeMeta::new(op)),
        Err(err) => Envelope::failure(
            &ToolError::internal(format!("failed to serialize reply: {err}")),
            EnvelopeMeta::new(op),
        ),
    }
}

/// Handle one request line and produce the reply envelope.
pub async fn dispatch(service: &SandboxService, line: &str) -> Envelope {
    let request: WireRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            let error = ToolError::malformed_request(format!("invalid request line: {err}"));
            return Envelope::failure(&error, EnvelopeMeta::new("unknown"));
        }
    };

    match request {
        WireRequest::Execute {
            action,
            params,
            worker_id,
        } => service.execute(&action, params, &worker_id).await,
        WireRequest::ExecuteBatch { requests } => service.execute_batch(requests).await,
        WireRequest::CreateSession {
            worker_id,
            resource_type,
            config,
        } => {
            match service
                .create_session(&worker_id, &resource_type, config.as_ref())
                .await
            {
                Ok(descriptor) => reply("create_session", &descriptor),
                Err(err) => Envelope::failure(
                    &err.into_tool_error(),
                    EnvelopeMeta::new("create_session"),
                ),
            }
        }
        WireRequest::DestroySession {
            worker_id,
            resource_type,
        } => match service.destroy_session(&worker_id, &resource_type).await {
            Ok(existed) => reply("destroy_session", &serde_json::json!({"destroyed": existed})),
            Err(err) => Envelope::failure(
                &err.into_tool_error(),
                EnvelopeMeta::new("destroy_session"),
            ),
        },
        WireRequest::ListSessions => reply("list_sessions", &service.list_sessions()),
        WireRequest::ListTools => reply("list_tools", &service.list_tools()),
        WireRequest::Health => reply("health", &service.health()),
    }
}

async fn serve_connection(
    service: Arc<SandboxService>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let envelope = dispatch(&service, line).await;
                let mut payload = match serde_json::to_vec(&envelope) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(%peer, %err, "failed to serialize envelope");
                        continue;
                    }
                };
                payload.push(b'\n');
                if writer.write_all(&payload).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(%peer, %err, "connection read failed");
                break;
            }
        }
    }
    debug!(%peer, "client disconnected");
}

/// Accept connections until the token is cancelled. Session state survives
/// disconnects; only the explicit shutdown path tears anything down.
pub async fn run_server(
    service: Arc<SandboxService>,
    addr: &str,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "invocation surface listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    tokio::spawn(serve_connection(
                        Arc::clone(&service),
                        stream,
                        peer,
                        shutdown.clone(),
                    ));
                }
                Err(err) => warn!(%err, "accept failed"),
            },
        }
    }
    info!("invocation surface stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_domain::{CapabilityConfig, OperationDef, ToolContext};
    use serde_json::{Value, json};

    fn service() -> SandboxService {
        let echo = OperationDef::new("echo", "Echo parameters", |ctx: ToolContext| async move {
            Ok(Value::Object(ctx.params))
        });
        SandboxService::builder()
            .register_tool(echo, "echo", CapabilityConfig::new())
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_execute() {
        let service = service();
        let envelope = dispatch(
            &service,
            r#"{"op": "execute", "action": "echo", "params": {"text": "hi"}}"#,
        )
        .await;
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data, Some(json!({"text": "hi"})));
    }

    #[tokio::test]
    async fn test_dispatch_malformed_line() {
        let service = service();
        let envelope = dispatch(&service, "{not json").await;
        assert_eq!(envelope.code, 4000);
        assert!(!envelope.meta.trace_id.is_empty());

        // An unknown op is malformed too, not a crash
        let envelope = dispatch(&service, r#"{"op": "reboot_world"}"#).await;
        assert_eq!(envelope.code, 4000);
    }

    #[tokio::test]
    async fn test_dispatch_batch() {
        let service = service();
        let envelope = dispatch(
            &service,
            r#"{"op": "execute_batch", "requests": [
                {"action": "echo", "params": {"n": 1}},
                {"action": "missing"}
            ]}"#,
        )
        .await;
        assert_eq!(envelope.code, 5009);
        assert_eq!(envelope.data.unwrap()["failed_count"], json!(1));
    }

    #[tokio::test]
    async fn test_dispatch_management_ops() {
        let service = service();

        let envelope = dispatch(&service, r#"{"op": "list_tools"}"#).await;
        assert_eq!(envelope.code, 0);
        let tools = envelope.data.unwrap();
        assert_eq!(tools[0]["full_name"], json!("echo"));

        let envelope = dispatch(&service, r#"{"op": "health"}"#).await;
        assert_eq!(envelope.data.unwrap()["status"], json!("ok"));

        let envelope = dispatch(&service, r#"{"op": "list_sessions"}"#).await;
        assert_eq!(envelope.data, Some(json!([])));

        // Destroying a never-created session reports false, not an error
        let envelope = dispatch(
            &service,
            r#"{"op": "destroy_session", "resource_type": "browser"}"#,
        )
        .await;
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data.unwrap()["destroyed"], json!(false));
    }

    #[tokio::test]
    async fn test_create_session_without_backend_fails() {
        let service = service();
        let envelope = dispatch(
            &service,
            r#"{"op": "create_session", "resource_type": "browser"}"#,
        )
        .await;
        assert_eq!(envelope.code, 4006);
    }

    #[tokio::test]
    async fn test_roundtrip_over_tcp() {
        use tokio::io::AsyncReadExt;

        let service = Arc::new(service());
        let shutdown = CancellationToken::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = {
            let service = Arc::clone(&service);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_server(service, &addr.to_string(), shutdown).await.unwrap();
            })
        };
        // Let the listener come up
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"{\"op\": \"health\"}\n")
            .await
            .unwrap();

        let mut buffer = vec![0u8; 4096];
        let n = stream.read(&mut buffer).await.unwrap();
        let envelope: Envelope = serde_json::from_slice(&buffer[..n]).unwrap();
        assert_eq!(envelope.code, 0);

        shutdown.cancel();
        server.await.unwrap();
    }
}
