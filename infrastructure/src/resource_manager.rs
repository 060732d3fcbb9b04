//! Pooled resource manager
//!
//! Implements the application-layer [`ResourceManager`] port on top of the
//! pool actor. The pool hands out metadata leases; the worker-local live
//! attachment (a VNC connection, an SSH channel) is built here through the
//! [`Attacher`] seam, so nothing live ever crosses the pool boundary.

use crate::pool::{PoolClient, PoolError};
use async_trait::async_trait;
use sandbox_application::{
    Attachment, BackendError, ResourceError, ResourceHandle, ResourceManager, SessionScoped,
};
use sandbox_domain::{CapabilityConfig, ConnectionInfo, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds the worker-local attachment for a leased unit.
#[async_trait]
pub trait Attacher: Send + Sync + 'static {
    async fn attach(
        &self,
        unit_id: &str,
        connection_info: &ConnectionInfo,
    ) -> Result<Box<dyn Attachment>, ResourceError>;
}

fn map_pool_error(err: PoolError) -> ResourceError {
    match err {
        PoolError::Timeout(_) => ResourceError::Timeout,
        PoolError::Stopped => ResourceError::Stopped,
        other => ResourceError::Pool(other.to_string()),
    }
}

/// [`ResourceManager`] backed by the pool actor plus a per-worker attacher.
pub struct PooledResourceManager {
    pool: PoolClient,
    attacher: Arc<dyn Attacher>,
    allocation_timeout: Duration,
}

impl PooledResourceManager {
    pub fn new(pool: PoolClient, attacher: Arc<dyn Attacher>, allocation_timeout: Duration) -> Self {
        Self {
            pool,
            attacher,
            allocation_timeout,
        }
    }
}

#[async_trait]
impl ResourceManager for PooledResourceManager {
    async fn initialize(&self) -> Result<(), ResourceError> {
        // Units were provisioned when the pool was spawned.
        Ok(())
    }

    async fn allocate(&self, worker_id: &str) -> Result<ResourceHandle, ResourceError> {
        let lease = self
            .pool
            .allocate(worker_id, self.allocation_timeout)
            .await
            .map_err(map_pool_error)?;

        match self.attacher.attach(&lease.unit_id, &lease.connection_info).await {
            Ok(attachment) => {
                debug!(unit_id = %lease.unit_id, worker_id, "worker attached to unit");
                Ok(ResourceHandle::new(
                    lease.unit_id,
                    worker_id,
                    lease.connection_info,
                    attachment,
                ))
            }
            Err(err) => {
                // The lease is already ours; hand the unit back so it is
                // not stranded in Busy.
                if let Err(release_err) = self.pool.release(&lease.unit_id, worker_id).await {
                    warn!(
                        unit_id = %lease.unit_id,
                        %release_err,
                        "failed to return unit after attach failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn release(&self, mut handle: ResourceHandle) -> Result<(), ResourceError> {
        // Local teardown first; the remote release still runs when it
        // fails, so the unit is never leaked.
        let detach_result = handle.detach().await;
        let release_result = self
            .pool
            .release(&handle.unit_id, &handle.worker_id)
            .await
            .map_err(map_pool_error);
        detach_result.and(release_result)
    }

    async fn stop_all(&self) -> Result<(), ResourceError> {
        self.pool.stop_all().await.map_err(map_pool_error)
    }
}

/// Adapts a [`ResourceManager`] to the per-session lifecycle: session
/// creation allocates a unit, session destruction returns it.
pub struct PooledSessionScope {
    manager: Arc<dyn ResourceManager>,
}

impl PooledSessionScope {
    pub fn new(manager: Arc<dyn ResourceManager>) -> Self {
        Self { manager }
    }
}

/// The payload stored in the session: the held unit, behind a lock so the
/// cleanup hook can take it out by value while operations read it.
pub struct HeldUnit(tokio::sync::Mutex<Option<ResourceHandle>>);

impl HeldUnit {
    fn new(handle: ResourceHandle) -> Self {
        Self(tokio::sync::Mutex::new(Some(handle)))
    }

    /// Unit id and connection info of the held unit, or `None` once it has
    /// been returned to the pool.
    pub async fn describe(&self) -> Option<(String, ConnectionInfo)> {
        self.0
            .lock()
            .await
            .as_ref()
            .map(|handle| (handle.unit_id.clone(), handle.connection_info.clone()))
    }

    async fn take(&self) -> Option<ResourceHandle> {
        self.0.lock().await.take()
    }
}

#[async_trait]
impl SessionScoped for PooledSessionScope {
    async fn initialize(
        &self,
        worker_id: &str,
        _config: &CapabilityConfig,
    ) -> Result<SessionState, BackendError> {
        let handle = self
            .manager
            .allocate(worker_id)
            .await
            .map_err(|err| BackendError::Init(err.to_string()))?;
        Ok(SessionState::new(HeldUnit::new(handle)))
    }

    async fn cleanup(&self, worker_id: &str, state: SessionState) -> Result<(), BackendError> {
        let Some(held) = state.downcast::<HeldUnit>() else {
            return Err(BackendError::Cleanup(format!(
                "session state for worker '{worker_id}' is not a held unit"
            )));
        };
        let Some(handle) = held.take().await else {
            // Already released; nothing to do.
            return Ok(());
        };
        self.manager
            .release(handle)
            .await
            .map_err(|err| BackendError::Cleanup(err.to_string()))
    }
}
