//! Pool manager for heavyweight external resources
//!
//! A single owning task holds all pool bookkeeping; workers reach it only
//! through the [`PoolClient`] proxy over a message channel. No pool state is
//! ever shared directly, so a crash in a worker's resource usage cannot
//! corrupt the books.

pub mod manager;
pub mod process;
pub mod provisioner;

pub use manager::{PoolClient, PoolManager};
pub use process::ProcessProvisioner;
pub use provisioner::UnitProvisioner;

use std::time::Duration;
use thiserror::Error;

/// Pool errors crossing the proxy boundary.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No unit became free in time. Retryable, not fatal.
    #[error("no idle unit available within {0:?}")]
    Timeout(Duration),

    #[error("unit '{unit_id}' is not held by worker '{worker_id}'")]
    NotOwner { unit_id: String, worker_id: String },

    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    #[error("pool is stopped")]
    Stopped,

    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("reset to baseline failed: {0}")]
    Reset(String),

    #[error("teardown failed: {0}")]
    Teardown(String),
}

impl PoolError {
    /// Whether the caller should retry rather than give up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }
}
