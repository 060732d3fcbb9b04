//! Pool manager actor and its proxy client
//!
//! The manager task owns every [`PoolUnit`] plus the idle queue and waiter
//! list. Commands arrive over an mpsc channel; replies go back over oneshot
//! channels. Allocation timeouts live on the caller side: an abandoned
//! waiter is detected by its closed reply channel and skipped.

use super::provisioner::UnitProvisioner;
use super::PoolError;
use sandbox_domain::{CapabilityConfig, PoolLease, PoolUnit, UnitState};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

enum PoolCommand {
    Allocate {
        worker_id: String,
        reply: oneshot::Sender<Result<PoolLease, PoolError>>,
    },
    Release {
        unit_id: String,
        worker_id: String,
        reply: oneshot::Sender<Result<(), PoolError>>,
    },
    ReportError {
        unit_id: String,
        worker_id: String,
        reason: String,
        reply: oneshot::Sender<Result<(), PoolError>>,
    },
    Status {
        reply: oneshot::Sender<Vec<PoolUnit>>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
}

struct Waiter {
    worker_id: String,
    reply: oneshot::Sender<Result<PoolLease, PoolError>>,
}

/// The owning actor. Constructed via [`PoolManager::spawn`], which
/// provisions the pool and returns the only way to reach it.
pub struct PoolManager {
    units: HashMap<String, PoolUnit>,
    idle: VecDeque<String>,
    waiters: VecDeque<Waiter>,
    provisioner: Arc<dyn UnitProvisioner>,
    stopped: bool,
}

impl PoolManager {
    /// Provision `count` units from the template and start the manager
    /// task. Fails fast when any unit cannot be provisioned.
    pub async fn spawn(
        provisioner: Arc<dyn UnitProvisioner>,
        count: usize,
        template: CapabilityConfig,
    ) -> Result<PoolClient, PoolError> {
        let mut units = HashMap::with_capacity(count);
        let mut idle = VecDeque::with_capacity(count);
        for index in 0..count {
            let unit_id = format!("unit-{index}");
            let connection_info = provisioner.provision(&unit_id, &template).await?;
            units.insert(unit_id.clone(), PoolUnit::new(&unit_id, connection_info));
            idle.push_back(unit_id);
        }
        info!(count, "resource pool provisioned");

        let manager = Self {
            units,
            idle,
            waiters: VecDeque::new(),
            provisioner,
            stopped: false,
        };
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(manager.run(rx));
        Ok(PoolClient { tx })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<PoolCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                PoolCommand::Allocate { worker_id, reply } => {
                    self.handle_allocate(worker_id, reply);
                }
                PoolCommand::Release {
                    unit_id,
                    worker_id,
                    reply,
                } => {
                    let result = self.handle_release(&unit_id, &worker_id).await;
                    let _ = reply.send(result);
                }
                PoolCommand::ReportError {
                    unit_id,
                    worker_id,
                    reason,
                    reply,
                } => {
                    let _ = reply.send(self.handle_report_error(&unit_id, &worker_id, &reason));
                }
                PoolCommand::Status { reply } => {
                    let _ = reply.send(self.units.values().cloned().collect());
                }
                PoolCommand::StopAll { reply } => {
                    self.handle_stop_all().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }

    fn handle_allocate(
        &mut self,
        worker_id: String,
        reply: oneshot::Sender<Result<PoolLease, PoolError>>,
    ) {
        if self.stopped {
            let _ = reply.send(Err(PoolError::Stopped));
            return;
        }
        match self.pop_idle(&worker_id) {
            Some(lease) => {
                let _ = reply.send(Ok(lease));
            }
            None => {
                debug!(worker_id, "no idle unit, parking waiter");
                self.waiters.push_back(Waiter { worker_id, reply });
            }
        }
    }

    /// Pop an idle unit and mark it busy for `worker_id`.
    fn pop_idle(&mut self, worker_id: &str) -> Option<PoolLease> {
        let unit_id = self.idle.pop_front()?;
        let unit = self
            .units
            .get_mut(&unit_id)
            .unwrap_or_else(|| panic!("idle queue references unknown unit {unit_id}"));
        unit.state = UnitState::Busy;
        unit.allocated_to = Some(worker_id.to_string());
        debug!(unit_id, worker_id, "unit allocated");
        Some(PoolLease {
            unit_id,
            connection_info: unit.connection_info.clone(),
        })
    }

    async fn handle_release(&mut self, unit_id: &str, worker_id: &str) -> Result<(), PoolError> {
        let unit = self
            .units
            .get(unit_id)
            .ok_or_else(|| PoolError::UnknownUnit(unit_id.to_string()))?;
        if !unit.is_held_by(worker_id) {
            return Err(PoolError::NotOwner {
                unit_id: unit_id.to_string(),
                worker_id: worker_id.to_string(),
            });
        }

        let reset_result = self.provisioner.reset(unit).await;
        let unit = self
            .units
            .get_mut(unit_id)
            .ok_or_else(|| PoolError::UnknownUnit(unit_id.to_string()))?;
        unit.allocated_to = None;
        match reset_result {
            Ok(()) => {
                unit.state = UnitState::Idle;
                self.idle.push_back(unit_id.to_string());
                debug!(unit_id, "unit reset and re-enqueued");
                self.wake_waiters();
                Ok(())
            }
            Err(err) => {
                // A unit that failed its reset never re-enters circulation.
                unit.state = UnitState::Error;
                warn!(unit_id, %err, "reset failed, unit parked in error state");
                Err(err)
            }
        }
    }

    fn handle_report_error(
        &mut self,
        unit_id: &str,
        worker_id: &str,
        reason: &str,
    ) -> Result<(), PoolError> {
        let unit = self
            .units
            .get_mut(unit_id)
            .ok_or_else(|| PoolError::UnknownUnit(unit_id.to_string()))?;
        if !unit.is_held_by(worker_id) {
            return Err(PoolError::NotOwner {
                unit_id: unit_id.to_string(),
                worker_id: worker_id.to_string(),
            });
        }
        unit.state = UnitState::Error;
        unit.allocated_to = None;
        warn!(unit_id, reason, "unit reported as errored");
        Ok(())
    }

    /// Hand freed units to parked waiters, skipping abandoned ones.
    fn wake_waiters(&mut self) {
        while !self.idle.is_empty() {
            let Some(waiter) = self.waiters.pop_front() else {
                return;
            };
            if waiter.reply.is_closed() {
                // Caller timed out and went away
                continue;
            }
            if let Some(lease) = self.pop_idle(&waiter.worker_id) {
                let unit_id = lease.unit_id.clone();
                if let Err(Ok(lease)) = waiter.reply.send(Ok(lease)) {
                    // Receiver dropped between the closed check and the
                    // send; put the unit straight back.
                    let unit = self
                        .units
                        .get_mut(&lease.unit_id)
                        .unwrap_or_else(|| panic!("granted lease for unknown unit {unit_id}"));
                    unit.state = UnitState::Idle;
                    unit.allocated_to = None;
                    self.idle.push_front(lease.unit_id);
                }
            }
        }
    }

    async fn handle_stop_all(&mut self) {
        self.stopped = true;
        self.idle.clear();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.reply.send(Err(PoolError::Stopped));
        }
        for unit in self.units.values_mut() {
            if unit.state == UnitState::Stopped {
                continue;
            }
            if let Err(err) = self.provisioner.teardown(unit).await {
                warn!(unit_id = %unit.unit_id, %err, "teardown failed during stop");
            }
            unit.state = UnitState::Stopped;
            unit.allocated_to = None;
        }
        info!("resource pool stopped");
    }
}

/// Cloneable proxy to the pool manager. The only way to touch pool state.
#[derive(Clone)]
pub struct PoolClient {
    tx: mpsc::Sender<PoolCommand>,
}

impl PoolClient {
    /// Obtain an idle unit, waiting up to `timeout` for one to free up.
    pub async fn allocate(
        &self,
        worker_id: &str,
        timeout: Duration,
    ) -> Result<PoolLease, PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Allocate {
                worker_id: worker_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| PoolError::Stopped)?;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(PoolError::Timeout(timeout)),
            Ok(Err(_)) => Err(PoolError::Stopped),
            Ok(Ok(result)) => result,
        }
    }

    /// Return a unit. The manager verifies ownership and resets the unit to
    /// its baseline before re-enqueuing it.
    pub async fn release(&self, unit_id: &str, worker_id: &str) -> Result<(), PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Release {
                unit_id: unit_id.to_string(),
                worker_id: worker_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| PoolError::Stopped)?;
        rx.await.map_err(|_| PoolError::Stopped)?
    }

    /// Mark a held unit as broken without attempting a reset.
    pub async fn report_error(
        &self,
        unit_id: &str,
        worker_id: &str,
        reason: impl Into<String>,
    ) -> Result<(), PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::ReportError {
                unit_id: unit_id.to_string(),
                worker_id: worker_id.to_string(),
                reason: reason.into(),
                reply,
            })
            .await
            .map_err(|_| PoolError::Stopped)?;
        rx.await.map_err(|_| PoolError::Stopped)?
    }

    /// Snapshot of every unit's bookkeeping entry.
    pub async fn status(&self) -> Result<Vec<PoolUnit>, PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Status { reply })
            .await
            .map_err(|_| PoolError::Stopped)?;
        rx.await.map_err(|_| PoolError::Stopped)
    }

    /// Drain and tear down every unit. The manager task exits afterwards.
    pub async fn stop_all(&self) -> Result<(), PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::StopAll { reply })
            .await
            .map_err(|_| PoolError::Stopped)?;
        rx.await.map_err(|_| PoolError::Stopped)
    }
}
