//! Resource manager port — how workers obtain and return pooled resources
//!
//! The pool holds metadata only; each worker constructs its own local
//! attachment from the unit's connection info. Nothing live is ever shared
//! across the pool boundary.

use async_trait::async_trait;
use sandbox_domain::ConnectionInfo;
use thiserror::Error;

/// Errors crossing the resource-manager boundary.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No unit became free within the allocation timeout. Retryable.
    #[error("resource allocation timed out")]
    Timeout,

    /// The pool rejected or failed the request.
    #[error("pool error: {0}")]
    Pool(String),

    /// The worker-local attachment could not be built.
    #[error("attach failed: {0}")]
    Attach(String),

    /// The worker-local attachment could not be torn down.
    #[error("detach failed: {0}")]
    Detach(String),

    /// The pool has been stopped.
    #[error("resource pool is stopped")]
    Stopped,
}

impl ResourceError {
    /// Timeouts are transient: callers should retry, not give up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResourceError::Timeout)
    }
}

/// Worker-local live attachment to a remote unit (a VNC connection, an SSH
/// channel, a CDP websocket). Built per worker, never shared.
#[async_trait]
pub trait Attachment: Send {
    /// Tear down the local side. Run before the unit goes back to the pool.
    async fn detach(&mut self) -> Result<(), ResourceError>;
}

/// A unit held by one worker: pool metadata plus the worker-local attachment.
pub struct ResourceHandle {
    pub unit_id: String,
    pub worker_id: String,
    pub connection_info: ConnectionInfo,
    attachment: Option<Box<dyn Attachment>>,
}

impl ResourceHandle {
    pub fn new(
        unit_id: impl Into<String>,
        worker_id: impl Into<String>,
        connection_info: ConnectionInfo,
        attachment: Box<dyn Attachment>,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            worker_id: worker_id.into(),
            connection_info,
            attachment: Some(attachment),
        }
    }

    /// Tear down the local attachment. Idempotent.
    pub async fn detach(&mut self) -> Result<(), ResourceError> {
        match self.attachment.as_mut() {
            Some(attachment) => {
                let result = attachment.detach().await;
                self.attachment = None;
                result
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("unit_id", &self.unit_id)
            .field("worker_id", &self.worker_id)
            .field("attached", &self.attachment.is_some())
            .finish()
    }
}

/// Facade used by N parallel workers to share a fixed pool of heavyweight
/// resources without knowing pool internals.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Prepare the manager (no-op when the pool was provisioned elsewhere).
    async fn initialize(&self) -> Result<(), ResourceError>;

    /// Obtain a unit and attach to it locally.
    async fn allocate(&self, worker_id: &str) -> Result<ResourceHandle, ResourceError>;

    /// Return a unit. Local teardown happens first; the remote release is
    /// attempted even when local teardown fails, so units are never leaked.
    async fn release(&self, handle: ResourceHandle) -> Result<(), ResourceError>;

    /// Tear down every unit. Used on orchestrated shutdown.
    async fn stop_all(&self) -> Result<(), ResourceError>;
}
