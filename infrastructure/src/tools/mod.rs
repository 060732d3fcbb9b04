//! Built-in stateless tools

pub mod echo;

pub use echo::{ECHO, echo_operation};
