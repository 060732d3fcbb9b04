//! Provisioner seam between the pool and the real external resource

use super::PoolError;
use async_trait::async_trait;
use sandbox_domain::{CapabilityConfig, ConnectionInfo, PoolUnit};

/// Creates, resets and tears down the external resource behind a pool unit
/// (boot a VM, restore a snapshot, destroy an instance).
///
/// Implementations spawn whatever processes they need; on teardown they are
/// expected to terminate those transitively (see
/// [`process::terminate_gracefully`](super::process::terminate_gracefully))
/// so nothing is orphaned.
#[async_trait]
pub trait UnitProvisioner: Send + Sync + 'static {
    /// Bring up one unit and return the attach metadata workers will use.
    async fn provision(
        &self,
        unit_id: &str,
        template: &CapabilityConfig,
    ) -> Result<ConnectionInfo, PoolError>;

    /// Reset a unit to its baseline snapshot. Runs during release, before
    /// the unit re-enters circulation; a failure parks the unit in `Error`.
    async fn reset(&self, unit: &PoolUnit) -> Result<(), PoolError>;

    /// Tear the unit's external resource down. Runs on pool shutdown.
    async fn teardown(&self, unit: &PoolUnit) -> Result<(), PoolError>;
}
