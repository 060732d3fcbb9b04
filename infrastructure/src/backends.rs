//! Compiled-in backend implementations
//!
//! A `[resources.<type>]` config section names one of these through its
//! `implementation` key; [`build_backend`] resolves the name and assembles
//! the backend from the section's config block. First entry: `process_pool`,
//! a session-scoped backend whose sessions draw exclusive units from a pool
//! of child processes.

use crate::pool::{PoolError, PoolManager, ProcessProvisioner};
use crate::resource_manager::{Attacher, HeldUnit, PooledResourceManager, PooledSessionScope};
use async_trait::async_trait;
use sandbox_application::{
    Attachment, Backend, BackendError, ResourceError, ResourceManager, SessionScoped,
    Shutdownable,
};
use sandbox_domain::{
    CapabilityConfig, ConnectionInfo, OperationDef, ToolContext, ToolError,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Implementation name of the process-backed pooled backend.
pub const PROCESS_POOL: &str = "process_pool";

/// Errors while assembling a backend from its config section.
#[derive(Debug, Error)]
pub enum BackendBuildError {
    #[error("unknown backend implementation '{0}'")]
    UnknownImplementation(String),

    #[error("resource '{resource_type}' is missing required config key '{key}'")]
    MissingKey { resource_type: String, key: String },

    #[error("pool initialization failed: {0}")]
    Pool(#[from] PoolError),
}

/// Resolve an `implementation` name against the compiled-in backends.
pub async fn build_backend(
    implementation: &str,
    resource_type: &str,
    config: &CapabilityConfig,
) -> Result<Arc<dyn Backend>, BackendBuildError> {
    match implementation {
        PROCESS_POOL => build_process_pool(resource_type, config).await,
        other => Err(BackendBuildError::UnknownImplementation(other.to_string())),
    }
}

fn require_str<'a>(
    config: &'a CapabilityConfig,
    resource_type: &str,
    key: &str,
) -> Result<&'a str, BackendBuildError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BackendBuildError::MissingKey {
            resource_type: resource_type.to_string(),
            key: key.to_string(),
        })
}

fn seconds_or(config: &CapabilityConfig, key: &str, default: u64) -> Duration {
    Duration::from_secs(config.get(key).and_then(Value::as_u64).unwrap_or(default))
}

async fn build_process_pool(
    resource_type: &str,
    config: &CapabilityConfig,
) -> Result<Arc<dyn Backend>, BackendBuildError> {
    let command = require_str(config, resource_type, "command")?;
    let args: Vec<String> = config
        .get("args")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let pool_size = config.get("pool_size").and_then(Value::as_u64).unwrap_or(1) as usize;
    let allocation_timeout = seconds_or(config, "allocation_timeout_seconds", 30);
    let grace = seconds_or(config, "grace_seconds", 5);

    let provisioner = Arc::new(ProcessProvisioner::new(command, args, grace));
    let pool = PoolManager::spawn(provisioner, pool_size, config.clone()).await?;
    let manager: Arc<dyn ResourceManager> = Arc::new(PooledResourceManager::new(
        pool,
        Arc::new(NullAttacher),
        allocation_timeout,
    ));
    Ok(Arc::new(PooledBackend::new(resource_type, manager)))
}

struct NullAttachment;

#[async_trait]
impl Attachment for NullAttachment {
    async fn detach(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Attacher for units needing no worker-local handle; the connection info
/// alone is the interface.
struct NullAttacher;

#[async_trait]
impl Attacher for NullAttacher {
    async fn attach(
        &self,
        _unit_id: &str,
        _connection_info: &ConnectionInfo,
    ) -> Result<Box<dyn Attachment>, ResourceError> {
        Ok(Box::new(NullAttachment))
    }
}

/// Session-scoped backend over a resource pool: session creation draws a
/// unit, session destruction returns it, shutdown stops the pool.
pub struct PooledBackend {
    resource_type: String,
    manager: Arc<dyn ResourceManager>,
    scope: PooledSessionScope,
}

impl PooledBackend {
    pub fn new(resource_type: impl Into<String>, manager: Arc<dyn ResourceManager>) -> Self {
        Self {
            resource_type: resource_type.into(),
            scope: PooledSessionScope::new(Arc::clone(&manager)),
            manager,
        }
    }
}

impl Backend for PooledBackend {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn operations(self: Arc<Self>) -> Vec<OperationDef> {
        vec![OperationDef::new(
            "status",
            "Unit id and connection info of the unit held by this session",
            |ctx: ToolContext| async move {
                let session = ctx.require_session()?;
                let held = session
                    .state
                    .downcast::<HeldUnit>()
                    .ok_or_else(|| ToolError::internal("session does not hold a pooled unit"))?;
                match held.describe().await {
                    Some((unit_id, connection_info)) => Ok(json!({
                        "unit_id": unit_id,
                        "connection_info": connection_info,
                    })),
                    None => Err(ToolError::internal("pooled unit already released")),
                }
            },
        )]
    }

    fn as_session_scoped(&self) -> Option<&dyn SessionScoped> {
        Some(&self.scope)
    }

    fn as_shutdownable(&self) -> Option<&dyn Shutdownable> {
        Some(self)
    }
}

#[async_trait]
impl Shutdownable for PooledBackend {
    async fn shutdown(&self) -> Result<(), BackendError> {
        self.manager
            .stop_all()
            .await
            .map_err(|err| BackendError::Shutdown(err.to_string()))
    }
}
