//! Sandbox service facade — the wired orchestration core
//!
//! Built once at startup from the static configuration: backends and
//! stateless tools register their operations, the router takes ownership of
//! session lifecycles, and the executor serves the invocation surface.

use crate::executor::ToolExecutor;
use crate::ports::backend::Backend;
use crate::router::{RouterError, SessionRouter, spawn_sweeper};
use sandbox_domain::tool::registry::RegistryError;
use sandbox_domain::{
    CapabilityConfig, Envelope, InvokeRequest, ParamSpec, SessionDescriptor, ToolRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Introspection entry for one registered operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

/// Liveness snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub uptime_ms: u64,
    pub tools: usize,
    pub sessions: usize,
}

/// Builder assembling the service from static configuration.
pub struct SandboxServiceBuilder {
    registry: ToolRegistry,
    backends: HashMap<String, Arc<dyn Backend>>,
    resource_defaults: HashMap<String, CapabilityConfig>,
    api_configs: HashMap<String, CapabilityConfig>,
    session_ttl: Duration,
    call_timeout: Duration,
    sweep_interval: Duration,
}

impl Default for SandboxServiceBuilder {
    fn default() -> Self {
        Self {
            registry: ToolRegistry::new(),
            backends: HashMap::new(),
            resource_defaults: HashMap::new(),
            api_configs: HashMap::new(),
            session_ttl: Duration::from_secs(600),
            call_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl SandboxServiceBuilder {
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Register a backend and its operations under its resource type.
    pub fn register_backend(
        mut self,
        backend: Arc<dyn Backend>,
        default_config: CapabilityConfig,
    ) -> Result<Self, RegistryError> {
        let resource_type = backend.resource_type().to_string();
        let operations = Arc::clone(&backend).operations();
        self.registry
            .register_backend_operations(&resource_type, operations)?;
        self.resource_defaults
            .insert(resource_type.clone(), default_config);
        self.backends.insert(resource_type, backend);
        Ok(self)
    }

    /// Register a stateless tool with the `apis` config block to inject.
    pub fn register_tool(
        mut self,
        op: sandbox_domain::OperationDef,
        config_key: impl Into<String>,
        config: CapabilityConfig,
    ) -> Result<Self, RegistryError> {
        let config_key = config_key.into();
        self.registry
            .register_stateless_tool(op, config_key.clone())?;
        self.api_configs.insert(config_key, config);
        Ok(self)
    }

    pub fn build(self) -> SandboxService {
        let registry = Arc::new(self.registry);
        let router = Arc::new(SessionRouter::new(
            self.backends,
            self.resource_defaults,
            self.session_ttl,
        ));
        let executor = ToolExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&router),
            self.api_configs,
            self.call_timeout,
        );
        SandboxService {
            registry,
            router,
            executor,
            sweep_interval: self.sweep_interval,
            started: Instant::now(),
            sweeper: Mutex::new(None),
        }
    }
}

/// The orchestration core behind every surface: invocation, session
/// management and introspection.
pub struct SandboxService {
    registry: Arc<ToolRegistry>,
    router: Arc<SessionRouter>,
    executor: ToolExecutor,
    sweep_interval: Duration,
    started: Instant,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SandboxService {
    pub fn builder() -> SandboxServiceBuilder {
        SandboxServiceBuilder::default()
    }

    /// Execute one operation.
    pub async fn execute(
        &self,
        action: &str,
        params: serde_json::Map<String, Value>,
        worker_id: &str,
    ) -> Envelope {
        self.executor.execute(action, params, worker_id).await
    }

    /// Execute a batch of operations.
    pub async fn execute_batch(&self, requests: Vec<InvokeRequest>) -> Envelope {
        self.executor.execute_batch(requests).await
    }

    /// Create (or return) the explicit session for a key.
    pub async fn create_session(
        &self,
        worker_id: &str,
        resource_type: &str,
        config: Option<&CapabilityConfig>,
    ) -> Result<SessionDescriptor, RouterError> {
        let entry = self
            .router
            .get_or_create(worker_id, resource_type, config)
            .await?;
        Ok(entry.descriptor())
    }

    /// Destroy the session for a key. Returns whether one existed.
    pub async fn destroy_session(
        &self,
        worker_id: &str,
        resource_type: &str,
    ) -> Result<bool, RouterError> {
        self.router.destroy(worker_id, resource_type).await
    }

    pub fn list_sessions(&self) -> Vec<SessionDescriptor> {
        self.router.list()
    }

    /// All registered operations with their declared parameters.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry
            .entries()
            .iter()
            .map(|entry| ToolInfo {
                full_name: entry.full_name.clone(),
                resource_type: entry.resource_type.clone(),
                description: entry.description.clone(),
                params: entry.params.clone(),
            })
            .collect()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok".to_string(),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            tools: self.registry.len(),
            sessions: self.router.session_count(),
        }
    }

    /// Eagerly warm the listed resource types. Unknown names are skipped
    /// with a warning; a failed warmup is reported but not fatal (the gate
    /// retries before first use).
    pub async fn warmup(&self, resource_types: &[String]) {
        for resource_type in resource_types {
            let Some(backend) = self.router.backend(resource_type) else {
                warn!(resource_type, "warmup requested for unknown resource type");
                continue;
            };
            match self.executor.ensure_warm(resource_type, &backend).await {
                Ok(()) => info!(resource_type, "backend warmed up"),
                Err(err) => warn!(resource_type, %err, "eager warmup failed"),
            }
        }
    }

    /// Start the background TTL sweeper.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock().unwrap();
        if guard.is_none() {
            *guard = Some(spawn_sweeper(
                Arc::clone(&self.router),
                self.sweep_interval,
            ));
        }
    }

    /// Orchestrated shutdown: stop the sweeper, destroy every session
    /// (running cleanup hooks), then run backend shutdown hooks.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
        self.router.destroy_all().await;
        for backend in self.router.backends() {
            if let Some(shutdownable) = backend.as_shutdownable()
                && let Err(err) = shutdownable.shutdown().await
            {
                warn!(resource_type = backend.resource_type(), %err, "backend shutdown failed");
            }
        }
        info!("sandbox service shut down");
    }
}
