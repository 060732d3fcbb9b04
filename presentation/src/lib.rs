//! Presentation layer for agent-sandbox
//!
//! The invocation surface clients talk to:
//!
//! - [`cli`] — command-line arguments of the daemon.
//! - [`protocol`] — the newline-delimited JSON request schema.
//! - [`server`] — the TCP listener and per-request dispatch onto the
//!   [`SandboxService`](sandbox_application::SandboxService) facade.

pub mod cli;
pub mod protocol;
pub mod server;

pub use cli::Cli;
pub use protocol::WireRequest;
pub use server::{dispatch, run_server};
