use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Relay counters, cheap to clone and share across request tasks.
#[derive(Debug, Clone, Default)]
pub struct RelayMetrics {
    requests: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    registrations: Arc<AtomicU64>,
    messages_queued: Arc<AtomicU64>,
    messages_delivered: Arc<AtomicU64>,
    replays: Arc<AtomicU64>,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub registrations: u64,
    pub messages_queued: u64,
    pub messages_delivered: u64,
    pub replays: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queued(&self) {
        self.messages_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replays(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            messages_queued: self.messages_queued.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Messages accepted but not yet picked up.
    pub fn pending(&self) -> u64 {
        self.messages_queued.saturating_sub(self.messages_delivered)
    }
}
