//! Ports (interfaces) implemented by infrastructure adapters

pub mod backend;
pub mod resource_manager;
