//! Domain layer for agent-sandbox
//!
//! This crate contains the core types of the sandbox orchestration layer.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Operations and the registry
//!
//! Every capability the sandbox exposes is an *operation*: a named async
//! handler with a declared parameter schema. Operations either belong to a
//! stateful backend (namespaced as `resource_type:operation`) or stand alone
//! as stateless tools. The [`ToolRegistry`] is the single name → operation
//! index, built once at startup.
//!
//! ## Envelope
//!
//! Every invocation outcome, success or failure, is normalized into an
//! [`Envelope`] with a numeric code (`0` success, `4xxx` caller error,
//! `5xxx` provider error) and a trace id for log correlation.
//!
//! ## Sessions and pool units
//!
//! Stateful backends hold per-`(worker, resource type)` sessions whose state
//! is opaque to the orchestration layer ([`SessionState`]). Heavyweight
//! resources are tracked as [`PoolUnit`]s with a strict
//! `Idle → Busy → Idle | Error → Stopped` lifecycle.

pub mod config;
pub mod envelope;
pub mod pool;
pub mod session;
pub mod tool;

// Re-export commonly used types
pub use config::{CapabilityConfig, shallow_merge};
pub use envelope::{Envelope, EnvelopeMeta};
pub use pool::{ConnectionInfo, PoolLease, PoolUnit, UnitState};
pub use session::{
    entities::{SessionDescriptor, SessionKey, new_session_id},
    state::SessionState,
};
pub use tool::{
    entities::{InvokeRequest, OperationDef, SessionContext, ToolContext, default_worker_id},
    error::{ErrorCode, ToolError},
    registry::{RegistryEntry, RegistryError, ToolRegistry},
    schema::{ParamSpec, ParamType, validate_params},
};
