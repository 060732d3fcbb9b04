//! Process-backed pool units
//!
//! [`ProcessProvisioner`] runs one child process per unit (a QEMU instance,
//! a browser driver, an emulator). Teardown follows the orchestrated
//! shutdown discipline: ask nicely, wait a bounded grace period, then
//! force-kill.

use super::PoolError;
use super::provisioner::UnitProvisioner;
use async_trait::async_trait;
use sandbox_domain::{CapabilityConfig, ConnectionInfo, PoolUnit};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Terminate a child process: SIGTERM (on unix), wait up to `grace`, then
/// SIGKILL and reap. Returns the same error a failed kill would.
pub async fn terminate_gracefully(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain signal send to a pid we own
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    child.start_kill()?;

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => {
            warn!("child ignored graceful stop, force-killing");
            child.start_kill()?;
            child.wait().await.map(|_| ())
        }
    }
}

/// Provisioner spawning one child process per pool unit.
///
/// Reset verifies the child is still running; a dead child parks the unit
/// in `Error` instead of recirculating a unit whose resource is gone.
pub struct ProcessProvisioner {
    command: String,
    args: Vec<String>,
    grace: Duration,
    children: tokio::sync::Mutex<HashMap<String, Child>>,
}

impl ProcessProvisioner {
    pub fn new(command: impl Into<String>, args: Vec<String>, grace: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            grace,
            children: tokio::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UnitProvisioner for ProcessProvisioner {
    async fn provision(
        &self,
        unit_id: &str,
        _template: &CapabilityConfig,
    ) -> Result<ConnectionInfo, PoolError> {
        let child = Command::new(&self.command)
            .args(&self.args)
            .spawn()
            .map_err(|err| {
                PoolError::Provision(format!("failed to spawn '{}': {err}", self.command))
            })?;
        debug!(unit_id, pid = child.id(), command = %self.command, "unit process spawned");

        let mut info = ConnectionInfo::new();
        info.insert("command".to_string(), json!(self.command));
        info.insert("pid".to_string(), json!(child.id()));
        self.children.lock().await.insert(unit_id.to_string(), child);
        Ok(info)
    }

    async fn reset(&self, unit: &PoolUnit) -> Result<(), PoolError> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(&unit.unit_id)
            .ok_or_else(|| PoolError::Reset(format!("no process for unit '{}'", unit.unit_id)))?;
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(PoolError::Reset(format!(
                "unit process exited ({status})"
            ))),
            Err(err) => Err(PoolError::Reset(err.to_string())),
        }
    }

    async fn teardown(&self, unit: &PoolUnit) -> Result<(), PoolError> {
        let child = self.children.lock().await.remove(&unit.unit_id);
        match child {
            Some(mut child) => terminate_gracefully(&mut child, self.grace)
                .await
                .map_err(|err| PoolError::Teardown(err.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sigterm_ends_child_within_grace() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");

        let started = Instant::now();
        terminate_gracefully(&mut child, Duration::from_secs(5))
            .await
            .unwrap();
        // SIGTERM ends sleep immediately, well inside the grace period
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sigkill_after_grace() {
        // A shell trapping SIGTERM forces the kill path
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .expect("spawn sh");
        // Give the shell a moment to install the trap
        tokio::time::sleep(Duration::from_millis(100)).await;

        terminate_gracefully(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
    }

    fn unit(unit_id: &str) -> PoolUnit {
        PoolUnit::new(unit_id, ConnectionInfo::new())
    }

    #[tokio::test]
    async fn test_provision_reset_teardown_cycle() {
        let provisioner =
            ProcessProvisioner::new("sleep", vec!["30".to_string()], Duration::from_secs(2));

        let info = provisioner
            .provision("unit-0", &CapabilityConfig::new())
            .await
            .unwrap();
        assert!(info["pid"].is_number());

        // Child alive: reset passes
        provisioner.reset(&unit("unit-0")).await.unwrap();
        provisioner.teardown(&unit("unit-0")).await.unwrap();
        // Teardown of an already-removed unit is a no-op
        provisioner.teardown(&unit("unit-0")).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_fails_for_dead_child() {
        let provisioner =
            ProcessProvisioner::new("true", Vec::new(), Duration::from_secs(2));
        provisioner
            .provision("unit-0", &CapabilityConfig::new())
            .await
            .unwrap();
        // `true` exits immediately
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = provisioner.reset(&unit("unit-0")).await.unwrap_err();
        assert!(matches!(err, PoolError::Reset(_)));
    }
}
