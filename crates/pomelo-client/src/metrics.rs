//! Client-side counters
//!
//! Background workers absorb errors; these counters are how the numbers
//! stay observable. Reads are snapshots, writes are relaxed atomics on the
//! hot paths.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ClientMetrics {
    pub fetch_success: AtomicU64,
    pub fetch_failure: AtomicU64,
    pub fetch_not_modified: AtomicU64,
    pub poll_success: AtomicU64,
    pub poll_not_modified: AtomicU64,
    pub poll_failure: AtomicU64,
    pub listener_failures: AtomicU64,
    pub cache_writes: AtomicU64,
    pub cache_write_failures: AtomicU64,
    pub cache_fallbacks: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fetch_success: u64,
    pub fetch_failure: u64,
    pub fetch_not_modified: u64,
    pub poll_success: u64,
    pub poll_not_modified: u64,
    pub poll_failure: u64,
    pub listener_failures: u64,
    pub cache_writes: u64,
    pub cache_write_failures: u64,
    pub cache_fallbacks: u64,
}

impl ClientMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetch_success: self.fetch_success.load(Ordering::Relaxed),
            fetch_failure: self.fetch_failure.load(Ordering::Relaxed),
            fetch_not_modified: self.fetch_not_modified.load(Ordering::Relaxed),
            poll_success: self.poll_success.load(Ordering::Relaxed),
            poll_not_modified: self.poll_not_modified.load(Ordering::Relaxed),
            poll_failure: self.poll_failure.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            cache_fallbacks: self.cache_fallbacks.load(Ordering::Relaxed),
        }
    }
}
