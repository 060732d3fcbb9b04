//! Opaque per-session backend state
//!
//! A backend's `initialize` hook returns whatever state its operations need;
//! the router stores it without looking inside. Backends get their concrete
//! type back with a checked downcast.

use std::any::Any;
use std::sync::Arc;

/// Cheaply cloneable, type-erased session payload.
#[derive(Clone)]
pub struct SessionState(Arc<dyn Any + Send + Sync>);

impl SessionState {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// State for sessions that carry no payload.
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Recover the concrete state type. Returns `None` when `T` is not the
    /// type the initialize hook stored.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionState(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_downcast_roundtrip() {
        let state = SessionState::new(Mutex::new(41_i64));
        let counter = state.downcast::<Mutex<i64>>().unwrap();
        *counter.lock().unwrap() += 1;

        let again = state.downcast::<Mutex<i64>>().unwrap();
        assert_eq!(*again.lock().unwrap(), 42);
    }

    #[test]
    fn test_downcast_wrong_type() {
        let state = SessionState::new(String::from("hello"));
        assert!(state.downcast::<i64>().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let state = SessionState::new(Mutex::new(0_i64));
        let clone = state.clone();
        *clone.downcast::<Mutex<i64>>().unwrap().lock().unwrap() = 7;
        assert_eq!(*state.downcast::<Mutex<i64>>().unwrap().lock().unwrap(), 7);
    }
}
