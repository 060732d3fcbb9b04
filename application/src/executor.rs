//! Tool executor — the single dispatch point
//!
//! Resolves an operation name, establishes (or fabricates) the session a
//! stateful operation needs, invokes the handler under the per-call timeout
//! and normalizes every outcome into an [`Envelope`]. Nothing escapes the
//! envelope boundary: handler errors, timeouts and even panics are contained
//! and mapped to taxonomy codes.

use crate::ports::backend::Backend;
use crate::router::{SessionEntry, SessionRouter};
use sandbox_domain::tool::registry::RegistryError;
use sandbox_domain::{
    CapabilityConfig, Envelope, EnvelopeMeta, ErrorCode, InvokeRequest, RegistryEntry,
    SessionContext, ToolContext, ToolError, ToolRegistry, validate_params,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Executes operations and builds response envelopes.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    router: Arc<SessionRouter>,
    /// Static config blocks for stateless tools, keyed by their config key
    api_configs: HashMap<String, CapabilityConfig>,
    call_timeout: Duration,
    /// One warm gate per warmable resource type; resets on failed warmup
    warm_gates: HashMap<String, OnceCell<()>>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        router: Arc<SessionRouter>,
        api_configs: HashMap<String, CapabilityConfig>,
        call_timeout: Duration,
    ) -> Self {
        let warm_gates = router
            .backends()
            .filter(|b| b.as_warmable().is_some())
            .map(|b| (b.resource_type().to_string(), OnceCell::new()))
            .collect();
        Self {
            registry,
            router,
            api_configs,
            call_timeout,
            warm_gates,
        }
    }

    /// Execute one operation. Always returns an envelope.
    pub async fn execute(
        &self,
        action: &str,
        params: serde_json::Map<String, Value>,
        worker_id: &str,
    ) -> Envelope {
        let started = Instant::now();
        let mut meta = EnvelopeMeta::new(action);
        let result = self.execute_inner(action, params, worker_id, &mut meta).await;
        meta.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(data) => Envelope::success(data, meta),
            Err(err) => {
                warn!(tool = %meta.tool, trace_id = %meta.trace_id, code = %err.code, %err, "execution failed");
                Envelope::failure(&err, meta)
            }
        }
    }

    /// Execute a batch of requests with the same per-item logic, then
    /// classify the aggregate: all succeeded, some failed (5009, results
    /// still included) or all failed (5008).
    pub async fn execute_batch(&self, requests: Vec<InvokeRequest>) -> Envelope {
        let started = Instant::now();
        let mut meta = EnvelopeMeta::new("batch");
        let total = requests.len();

        let mut results = Vec::with_capacity(total);
        for request in requests {
            results.push(
                self.execute(&request.action, request.params, &request.worker_id)
                    .await,
            );
        }
        let failed_count = results.iter().filter(|e| !e.is_success()).count();
        meta.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let data = json!({
            "results": results,
            "total": total,
            "failed_count": failed_count,
        });
        if failed_count == 0 {
            Envelope::success(Some(data), meta)
        } else if failed_count == total {
            let err = ToolError::new(
                ErrorCode::BatchAllFailed,
                format!("all {total} batch items failed"),
            );
            Envelope::failure_with_data(&err, data, meta)
        } else {
            let err = ToolError::new(
                ErrorCode::BatchPartialFailure,
                format!("{failed_count} of {total} batch items failed"),
            );
            Envelope::failure_with_data(&err, data, meta)
        }
    }

    async fn execute_inner(
        &self,
        action: &str,
        mut params: serde_json::Map<String, Value>,
        worker_id: &str,
        meta: &mut EnvelopeMeta,
    ) -> Result<Option<Value>, ToolError> {
        let entry = self
            .registry
            .resolve(action)
            .map_err(RegistryError::into_tool_error)?;
        meta.tool = entry.full_name.clone();
        meta.resource_type = entry.resource_type.clone();

        // Stateless tools get their static config defaults merged in
        // underneath the caller's parameters.
        if let Some(config_key) = &entry.config_key
            && let Some(config) = self.api_configs.get(config_key)
        {
            for (key, value) in config {
                params.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        validate_params(&entry.params, &mut params)?;

        let Some(resource_type) = entry.resource_type.clone() else {
            let ctx = ToolContext {
                params,
                worker_id: worker_id.to_string(),
                session: None,
            };
            return self.invoke(&entry, ctx).await.map(Some);
        };

        let backend = self
            .router
            .backend(&resource_type)
            .ok_or_else(|| ToolError::internal(format!("no backend for '{resource_type}'")))?;
        self.ensure_warm(&resource_type, &backend).await?;

        // Backends without session hooks run operations sessionless
        // (shared, global-only resources).
        if backend.as_session_scoped().is_none() {
            let ctx = ToolContext {
                params,
                worker_id: worker_id.to_string(),
                session: None,
            };
            return self.invoke(&entry, ctx).await.map(Some);
        }

        let (session, temporary) = match self.router.get(worker_id, &resource_type) {
            Some(session) => (session, false),
            None => {
                let session = self
                    .router
                    .open_temporary(worker_id, &resource_type)
                    .await
                    .map_err(|e| e.into_tool_error())?;
                (session, true)
            }
        };
        meta.session_id = Some(session.session_id.clone());
        session.touch();

        let ctx = ToolContext {
            params,
            worker_id: worker_id.to_string(),
            session: Some(SessionContext {
                session_id: session.session_id.clone(),
                resource_type: resource_type.clone(),
                state: session.state.clone(),
            }),
        };
        let result = self.invoke(&entry, ctx).await;

        // Cleanup must run even when the operation failed or timed out.
        if temporary {
            self.discard_temporary(&session).await;
        }
        result.map(Some)
    }

    /// Run the handler in its own task so a panic is contained, bounded by
    /// the per-call timeout.
    async fn invoke(
        &self,
        entry: &Arc<RegistryEntry>,
        ctx: ToolContext,
    ) -> Result<Value, ToolError> {
        debug!(tool = %entry.full_name, worker_id = %ctx.worker_id, "invoking");
        let handler = entry.handler();
        let task = tokio::spawn(async move { handler(ctx).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.call_timeout, task).await {
            Err(_) => {
                abort.abort();
                Err(ToolError::timeout(&entry.full_name))
            }
            Ok(Err(join_err)) => Err(ToolError::internal(format!(
                "operation '{}' aborted: {join_err}",
                entry.full_name
            ))),
            Ok(Ok(result)) => result,
        }
    }

    async fn discard_temporary(&self, session: &Arc<SessionEntry>) {
        if let Err(err) = self.router.close(session).await {
            warn!(session_id = %session.session_id, %err, "temporary session cleanup failed");
        }
    }

    /// Warm the backend once before first use. A failed warmup surfaces as
    /// 5007 and is retried on the next call.
    pub async fn ensure_warm(
        &self,
        resource_type: &str,
        backend: &Arc<dyn Backend>,
    ) -> Result<(), ToolError> {
        let Some(warmable) = backend.as_warmable() else {
            return Ok(());
        };
        let Some(gate) = self.warm_gates.get(resource_type) else {
            return Ok(());
        };
        gate.get_or_try_init(|| async {
            debug!(resource_type, "warming backend");
            warmable.warmup().await
        })
        .await
        .map_err(|err| {
            ToolError::backend_not_warm(resource_type).with_details(err.to_string())
        })?;
        Ok(())
    }
}
