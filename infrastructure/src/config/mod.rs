//! Configuration: file schema, loading and env substitution

pub mod env;
pub mod file_config;
pub mod loader;

pub use file_config::{ApisSection, FileConfig, ResourceSection, ServerSection};
pub use loader::{ConfigError, ConfigLoader};
