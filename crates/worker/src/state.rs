//! Worker availability state machine
//!
//! One cell shared by the probe responder, which only observes it, and the
//! session acceptor, which flips it. The lock is held for a single read or
//! write and never across I/O.

use parking_lot::Mutex;
use switchboard_common::METRICS;
use switchboard_proto::Availability;
use tracing::{debug, warn};

/// Local availability, FREE until a client attaches
#[derive(Debug, Default)]
pub struct SessionState {
    availability: Mutex<Availability>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current availability
    pub fn observe(&self) -> Availability {
        *self.availability.lock()
    }

    /// Mark a client as attached. The worker reads FREE again when the
    /// returned guard drops.
    pub fn begin_session(&self) -> SessionGuard<'_> {
        let previous = std::mem::replace(&mut *self.availability.lock(), Availability::Busy);
        if previous == Availability::Busy {
            warn!("Session started while another session is attached");
        }

        METRICS.worker.sessions_total.inc();
        METRICS.worker.session_active.set(1);
        debug!("Worker state FREE -> BUSY");

        SessionGuard { state: self }
    }

    fn end_session(&self) {
        *self.availability.lock() = Availability::Free;
        METRICS.worker.session_active.set(0);
        debug!("Worker state BUSY -> FREE");
    }
}

/// Keeps the worker BUSY for as long as it lives
#[must_use = "the session ends as soon as the guard is dropped"]
pub struct SessionGuard<'a> {
    state: &'a SessionState,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.state.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_free() {
        let state = SessionState::new();
        assert_eq!(state.observe(), Availability::Free);
    }

    #[test]
    fn test_busy_for_guard_lifetime() {
        let state = SessionState::new();

        let guard = state.begin_session();
        assert_eq!(state.observe(), Availability::Busy);

        drop(guard);
        assert_eq!(state.observe(), Availability::Free);
    }

    #[test]
    fn test_free_after_panicking_session() {
        let state = SessionState::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = state.begin_session();
            panic!("session handler failed");
        }));

        assert!(result.is_err());
        assert_eq!(state.observe(), Availability::Free);
    }

    #[test]
    fn test_observe_from_other_thread() {
        let state = std::sync::Arc::new(SessionState::new());
        let _guard = state.begin_session();

        let observer = std::sync::Arc::clone(&state);
        let seen = std::thread::spawn(move || observer.observe()).join().unwrap();
        assert_eq!(seen, Availability::Busy);
    }
}
