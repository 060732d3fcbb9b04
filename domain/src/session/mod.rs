//! Session domain: keys, descriptors and the opaque per-session state

pub mod entities;
pub mod state;
