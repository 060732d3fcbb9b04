//! Session router — creates, looks up, refreshes and destroys sessions
//!
//! One session per `(worker, resource type)`. Creation delegates to the
//! owning backend's initialize hook and is serialized per key, so two
//! concurrent callers never race a duplicate session into existence.
//! Cleanup runs exactly once per created session, whether it is torn down
//! explicitly, by the TTL sweep, or by the executor discarding a temporary
//! session.

use crate::ports::backend::{Backend, BackendError};
use sandbox_domain::{
    CapabilityConfig, SessionDescriptor, SessionKey, SessionState, ToolError, new_session_id,
    shallow_merge,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Router errors
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("resource type '{0}' does not support sessions")]
    NotSessionScoped(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RouterError {
    /// Convert into the envelope error taxonomy.
    pub fn into_tool_error(self) -> ToolError {
        match self {
            RouterError::Backend(err) => err.into_tool_error(),
            other => ToolError::session_init_failed(other.to_string()),
        }
    }
}

/// A live session owned by the router.
pub struct SessionEntry {
    pub worker_id: String,
    pub resource_type: String,
    pub session_id: String,
    pub is_temporary: bool,
    /// Opaque payload returned by the backend's initialize hook
    pub state: SessionState,
    ttl: Duration,
    created_wall: SystemTime,
    last_used: Mutex<Instant>,
    closed: AtomicBool,
}

impl SessionEntry {
    fn new(
        worker_id: &str,
        resource_type: &str,
        state: SessionState,
        ttl: Duration,
        is_temporary: bool,
    ) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            resource_type: resource_type.to_string(),
            session_id: new_session_id(),
            is_temporary,
            state,
            ttl,
            created_wall: SystemTime::now(),
            last_used: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
        }
    }

    /// Refresh the last-used timestamp.
    pub fn touch(&self) {
        *self.last_used.lock().unwrap() = Instant::now();
    }

    /// Time since the session was last used.
    pub fn idle_for(&self) -> Duration {
        self.last_used.lock().unwrap().elapsed()
    }

    fn is_expired(&self) -> bool {
        self.idle_for() > self.ttl
    }

    /// Serializable view of this session.
    pub fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            worker_id: self.worker_id.clone(),
            resource_type: self.resource_type.clone(),
            session_id: self.session_id.clone(),
            created_at: self
                .created_wall
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            idle_seconds: self.idle_for().as_secs(),
            ttl_seconds: self.ttl.as_secs(),
            is_temporary: self.is_temporary,
        }
    }
}

type SessionCell = Arc<OnceCell<Arc<SessionEntry>>>;

/// Owns every session and the resource-type → backend mapping.
pub struct SessionRouter {
    backends: HashMap<String, Arc<dyn Backend>>,
    defaults: HashMap<String, CapabilityConfig>,
    ttl: Duration,
    sessions: Mutex<HashMap<SessionKey, SessionCell>>,
}

impl SessionRouter {
    pub fn new(
        backends: HashMap<String, Arc<dyn Backend>>,
        defaults: HashMap<String, CapabilityConfig>,
        ttl: Duration,
    ) -> Self {
        Self {
            backends,
            defaults,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The backend owning a resource type.
    pub fn backend(&self, resource_type: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(resource_type).cloned()
    }

    /// All registered backends.
    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.values()
    }

    /// The existing session for a key, if one is fully created.
    pub fn get(&self, worker_id: &str, resource_type: &str) -> Option<Arc<SessionEntry>> {
        let key = SessionKey::new(worker_id, resource_type);
        let cell = self.sessions.lock().unwrap().get(&key).cloned()?;
        cell.get().cloned()
    }

    /// Get the session for `(worker_id, resource_type)`, creating it when
    /// absent. Creation is serialized per key.
    pub async fn get_or_create(
        &self,
        worker_id: &str,
        resource_type: &str,
        overrides: Option<&CapabilityConfig>,
    ) -> Result<Arc<SessionEntry>, RouterError> {
        let key = SessionKey::new(worker_id, resource_type);
        let cell: SessionCell = self
            .sessions
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .clone();

        let entry = cell
            .get_or_try_init(|| async {
                let state = self
                    .initialize_state(worker_id, resource_type, overrides)
                    .await?;
                let entry = Arc::new(SessionEntry::new(
                    worker_id,
                    resource_type,
                    state,
                    self.ttl,
                    false,
                ));
                info!(session_id = %entry.session_id, key = %key, "session created");
                Ok::<_, RouterError>(entry)
            })
            .await?
            .clone();

        // A concurrent destroy may have dropped the map entry while we were
        // initializing; the creator wins and the cell is re-inserted.
        self.sessions
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| cell.clone());

        entry.touch();
        Ok(entry)
    }

    /// Create a single-use session that is never stored in the map. The
    /// executor destroys it via [`close`](Self::close) right after the one
    /// operation that needed it.
    pub async fn open_temporary(
        &self,
        worker_id: &str,
        resource_type: &str,
    ) -> Result<Arc<SessionEntry>, RouterError> {
        let state = self.initialize_state(worker_id, resource_type, None).await?;
        let entry = Arc::new(SessionEntry::new(
            worker_id,
            resource_type,
            state,
            self.ttl,
            true,
        ));
        debug!(session_id = %entry.session_id, resource_type, "temporary session created");
        Ok(entry)
    }

    async fn initialize_state(
        &self,
        worker_id: &str,
        resource_type: &str,
        overrides: Option<&CapabilityConfig>,
    ) -> Result<SessionState, RouterError> {
        let backend = self
            .backends
            .get(resource_type)
            .ok_or_else(|| RouterError::UnknownResourceType(resource_type.to_string()))?;
        let scoped = backend
            .as_session_scoped()
            .ok_or_else(|| RouterError::NotSessionScoped(resource_type.to_string()))?;
        let config = shallow_merge(self.defaults.get(resource_type), overrides);
        Ok(scoped.initialize(worker_id, &config).await?)
    }

    /// Run the backend's cleanup hook for a session. Exactly once per entry;
    /// later calls are no-ops.
    pub async fn close(&self, entry: &Arc<SessionEntry>) -> Result<(), RouterError> {
        if entry.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let backend = self
            .backends
            .get(&entry.resource_type)
            .ok_or_else(|| RouterError::UnknownResourceType(entry.resource_type.clone()))?;
        let scoped = backend
            .as_session_scoped()
            .ok_or_else(|| RouterError::NotSessionScoped(entry.resource_type.clone()))?;
        debug!(session_id = %entry.session_id, "session closed");
        Ok(scoped
            .cleanup(&entry.worker_id, entry.state.clone())
            .await?)
    }

    /// Destroy the session for a key. Returns whether one existed.
    pub async fn destroy(
        &self,
        worker_id: &str,
        resource_type: &str,
    ) -> Result<bool, RouterError> {
        let key = SessionKey::new(worker_id, resource_type);
        let cell = self.sessions.lock().unwrap().remove(&key);
        match cell.as_ref().and_then(|c| c.get()) {
            Some(entry) => {
                self.close(entry).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove sessions idle past their TTL, invoking cleanup for each.
    /// Returns the number of sessions removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<(SessionKey, Arc<SessionEntry>)> = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .iter()
                .filter_map(|(key, cell)| cell.get().map(|e| (key.clone(), e.clone())))
                .filter(|(_, entry)| entry.is_expired())
                .collect()
        };

        let mut removed = 0;
        for (key, entry) in expired {
            self.sessions.lock().unwrap().remove(&key);
            if let Err(err) = self.close(&entry).await {
                warn!(session_id = %entry.session_id, %err, "cleanup failed during TTL sweep");
            }
            removed += 1;
        }
        if removed > 0 {
            info!(removed, "TTL sweep removed expired sessions");
        }
        removed
    }

    /// Descriptors of every live session.
    pub fn list(&self) -> Vec<SessionDescriptor> {
        let mut descriptors: Vec<_> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter_map(|cell| cell.get())
            .map(|entry| entry.descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        descriptors
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Destroy every session. Used on orchestrated shutdown.
    pub async fn destroy_all(&self) {
        let entries: Vec<Arc<SessionEntry>> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions
                .drain()
                .filter_map(|(_, cell)| cell.get().cloned())
                .collect()
        };
        for entry in entries {
            if let Err(err) = self.close(&entry).await {
                warn!(session_id = %entry.session_id, %err, "cleanup failed during shutdown");
            }
        }
    }
}

/// Spawn the background TTL sweeper.
pub fn spawn_sweeper(router: Arc<SessionRouter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            router.sweep_expired().await;
        }
    })
}
