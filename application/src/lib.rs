//! Application layer for agent-sandbox
//!
//! Use cases and ports of the orchestration core:
//!
//! - [`ports::backend`] — the backend lifecycle contract as a capability-set
//!   of traits ([`Warmable`], [`Shutdownable`], [`SessionScoped`]).
//! - [`ports::resource_manager`] — the facade worker code uses to obtain and
//!   return pooled resources without knowing pool internals.
//! - [`SessionRouter`] — creates, looks up, refreshes and destroys
//!   per-`(worker, resource type)` sessions under a TTL.
//! - [`ToolExecutor`] — the single dispatch point; every outcome becomes an
//!   [`Envelope`](sandbox_domain::Envelope).
//! - [`SandboxService`] — the wired facade the invocation surface talks to.

pub mod executor;
pub mod ports;
pub mod router;
pub mod service;

pub use executor::ToolExecutor;
pub use ports::backend::{Backend, BackendError, SessionScoped, Shutdownable, Warmable};
pub use ports::resource_manager::{
    Attachment, ResourceError, ResourceHandle, ResourceManager,
};
pub use router::{RouterError, SessionEntry, SessionRouter};
pub use service::{Health, SandboxService, SandboxServiceBuilder, ToolInfo};
