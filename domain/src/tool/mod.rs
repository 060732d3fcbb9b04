//! Tool domain: operation definitions, parameter schema, registry and errors

pub mod entities;
pub mod error;
pub mod registry;
pub mod schema;
