//! Pool domain: heavyweight-resource unit entities

pub mod entities;

pub use entities::{ConnectionInfo, PoolLease, PoolUnit, UnitState};
