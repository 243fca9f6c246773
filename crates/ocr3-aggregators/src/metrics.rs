//! Global atomic counters for aggregation rounds.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. after each round).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters with no allocation or locking.
pub struct Metrics {
    rounds_aggregated: AtomicU64,
    rounds_failed: AtomicU64,
    reports_requested: AtomicU64,
    observations_skipped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rounds_aggregated: AtomicU64::new(0),
            rounds_failed: AtomicU64::new(0),
            reports_requested: AtomicU64::new(0),
            observations_skipped: AtomicU64::new(0),
        }
    }

    pub fn inc_rounds_aggregated(&self) {
        self.rounds_aggregated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rounds_aggregated", "counter incremented");
    }

    pub fn inc_rounds_failed(&self) {
        self.rounds_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rounds_failed", "counter incremented");
    }

    pub fn inc_reports_requested(&self) {
        self.reports_requested.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reports_requested", "counter incremented");
    }

    pub fn inc_observations_skipped(&self) {
        self.observations_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "observations_skipped", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            rounds_aggregated = self.rounds_aggregated(),
            rounds_failed = self.rounds_failed(),
            reports_requested = self.reports_requested(),
            observations_skipped = self.observations_skipped(),
        );
    }

    pub fn rounds_aggregated(&self) -> u64 {
        self.rounds_aggregated.load(Ordering::Relaxed)
    }

    pub fn rounds_failed(&self) -> u64 {
        self.rounds_failed.load(Ordering::Relaxed)
    }

    pub fn reports_requested(&self) -> u64 {
        self.reports_requested.load(Ordering::Relaxed)
    }

    pub fn observations_skipped(&self) -> u64 {
        self.observations_skipped.load(Ordering::Relaxed)
    }
}
