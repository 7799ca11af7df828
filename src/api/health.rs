//! Shared health state for the /health endpoint.
//! Updated by the reconciler and the deck sessions, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct HealthState {
    /// Nanosecond timestamp of the last completed reconcile poll (0 = none).
    last_poll_at_ns: AtomicU64,
    polls_completed: AtomicU64,
    /// Markets whose chain read returned nothing in the most recent poll.
    last_poll_failures: AtomicU64,
    /// Currently connected deck sessions.
    active_sessions: AtomicU64,
}

impl HealthState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_poll(&self, at_ns: u64, failures: u64) {
        self.last_poll_at_ns.store(at_ns, Ordering::Relaxed);
        self.last_poll_failures.store(failures, Ordering::Relaxed);
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn last_poll_at_ns(&self) -> u64 {
        self.last_poll_at_ns.load(Ordering::Relaxed)
    }

    pub fn polls_completed(&self) -> u64 {
        self.polls_completed.load(Ordering::Relaxed)
    }

    pub fn last_poll_failures(&self) -> u64 {
        self.last_poll_failures.load(Ordering::Relaxed)
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }
}
