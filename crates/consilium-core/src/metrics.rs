//! Global atomic counters for request observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a request).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocation and no locking.
pub struct Metrics {
    requests: AtomicU64,
    roles_dispatched: AtomicU64,
    roles_failed: AtomicU64,
    roles_timed_out: AtomicU64,
    fallback_detections: AtomicU64,
    syntheses: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            roles_dispatched: AtomicU64::new(0),
            roles_failed: AtomicU64::new(0),
            roles_timed_out: AtomicU64::new(0),
            fallback_detections: AtomicU64::new(0),
            syntheses: AtomicU64::new(0),
        }
    }

    counter!(inc_requests, requests, requests);
    counter!(inc_roles_dispatched, roles_dispatched, roles_dispatched);
    counter!(inc_roles_failed, roles_failed, roles_failed);
    counter!(inc_roles_timed_out, roles_timed_out, roles_timed_out);
    counter!(inc_fallback_detections, fallback_detections, fallback_detections);
    counter!(inc_syntheses, syntheses, syntheses);

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            requests = self.requests(),
            roles_dispatched = self.roles_dispatched(),
            roles_failed = self.roles_failed(),
            roles_timed_out = self.roles_timed_out(),
            fallback_detections = self.fallback_detections(),
            syntheses = self.syntheses(),
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.roles_dispatched,
            &self.roles_failed,
            &self.roles_timed_out,
            &self.fallback_detections,
            &self.syntheses,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
