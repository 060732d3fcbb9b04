//! Infrastructure layer for agent-sandbox
//!
//! Adapters behind the application-layer ports:
//!
//! - [`config`] — figment-based configuration loading with environment
//!   variable substitution.
//! - [`pool`] — the Pool Manager actor owning a fixed set of heavyweight
//!   resource units, reached only through its [`pool::PoolClient`] proxy.
//! - [`resource_manager`] — the pooled [`ResourceManager`] facade workers
//!   use, plus the adapter wiring pooled units into session lifecycles.
//! - [`backends`] — compiled-in backend implementations resolvable from
//!   the config's per-resource `implementation` key.
//! - [`tools`] — built-in stateless tools.
//!
//! [`ResourceManager`]: sandbox_application::ResourceManager

pub mod backends;
pub mod config;
pub mod pool;
pub mod resource_manager;
pub mod tools;

pub use backends::{BackendBuildError, PooledBackend, build_backend};
pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use pool::{PoolClient, PoolError, PoolManager, ProcessProvisioner, UnitProvisioner};
pub use resource_manager::{Attacher, HeldUnit, PooledResourceManager, PooledSessionScope};
