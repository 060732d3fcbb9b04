//! Pool domain entities
//!
//! A pool unit is one instance of a heavyweight external resource (a VM, a
//! GPU slot, a browser). The pool tracks metadata only: the connection info
//! needed to attach is opaque and each worker builds its own live handle
//! from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque attach information for one unit (address, port, credentials, ...).
pub type ConnectionInfo = serde_json::Map<String, Value>;

/// Lifecycle state of a pool unit.
///
/// `Idle → Busy` only via a successful allocate; `Busy → Idle` only after a
/// reset-to-baseline succeeds during release. A failed reset parks the unit
/// in `Error` so it never silently re-enters circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Idle,
    Busy,
    Error,
    Stopped,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Idle => "idle",
            UnitState::Busy => "busy",
            UnitState::Error => "error",
            UnitState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bookkeeping entry for one pooled unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolUnit {
    pub unit_id: String,
    pub state: UnitState,
    pub connection_info: ConnectionInfo,
    /// Worker currently holding the unit, if any
    pub allocated_to: Option<String>,
    /// Baseline snapshot the unit is reset to on release
    pub snapshot_tag: Option<String>,
}

impl PoolUnit {
    pub fn new(unit_id: impl Into<String>, connection_info: ConnectionInfo) -> Self {
        Self {
            unit_id: unit_id.into(),
            state: UnitState::Idle,
            connection_info,
            allocated_to: None,
            snapshot_tag: None,
        }
    }

    pub fn with_snapshot_tag(mut self, tag: impl Into<String>) -> Self {
        self.snapshot_tag = Some(tag.into());
        self
    }

    pub fn is_idle(&self) -> bool {
        self.state == UnitState::Idle
    }

    pub fn is_held_by(&self, worker_id: &str) -> bool {
        self.state == UnitState::Busy && self.allocated_to.as_deref() == Some(worker_id)
    }
}

/// What a worker receives from a successful allocation: metadata only,
/// never a live object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolLease {
    pub unit_id: String,
    pub connection_info: ConnectionInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info() -> ConnectionInfo {
        let mut m = ConnectionInfo::new();
        m.insert("host".to_string(), json!("10.0.0.7"));
        m.insert("port".to_string(), json!(5900));
        m
    }

    #[test]
    fn test_new_unit_is_idle() {
        let unit = PoolUnit::new("unit-0", info());
        assert!(unit.is_idle());
        assert!(unit.allocated_to.is_none());
    }

    #[test]
    fn test_is_held_by() {
        let mut unit = PoolUnit::new("unit-0", info()).with_snapshot_tag("baseline");
        unit.state = UnitState::Busy;
        unit.allocated_to = Some("worker-1".to_string());

        assert!(unit.is_held_by("worker-1"));
        assert!(!unit.is_held_by("worker-2"));
        assert_eq!(unit.snapshot_tag.as_deref(), Some("baseline"));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_value(UnitState::Idle).unwrap(), json!("idle"));
        assert_eq!(UnitState::Error.to_string(), "error");
    }
}
