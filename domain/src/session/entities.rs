//! Session domain entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of a session partition: one session per `(worker, resource type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub worker_id: String,
    pub resource_type: String,
}

impl SessionKey {
    pub fn new(worker_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            resource_type: resource_type.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.worker_id, self.resource_type)
    }
}

/// Generate a fresh session identifier.
pub fn new_session_id() -> String {
    format!("sess-{}", Uuid::new_v4().simple())
}

/// Serializable view of a live session, as returned by `list_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub worker_id: String,
    pub resource_type: String,
    pub session_id: String,
    /// Creation time, seconds since the unix epoch
    pub created_at: u64,
    /// Seconds since the session was last used
    pub idle_seconds: u64,
    /// Configured time-to-live in seconds
    pub ttl_seconds: u64,
    /// Whether the executor fabricated this session for a single call
    pub is_temporary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_display() {
        let key = SessionKey::new("worker-3", "browser");
        assert_eq!(key.to_string(), "worker-3/browser");
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert!(a.starts_with("sess-"));
    }
}
