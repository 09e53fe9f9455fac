//! Decision counters and latency tracking

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of engine counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    /// Total number of `permitted`/`decide` evaluations
    pub total_decisions: u64,

    /// Number of grants
    pub granted: u64,

    /// Number of denials
    pub denied: u64,

    /// Guarded retrievals that found nothing to protect
    pub not_found: u64,

    /// Average evaluation latency in microseconds
    pub avg_latency_us: f64,
}

impl EngineMetrics {
    /// Fraction of decisions that granted access
    pub fn grant_rate(&self) -> f64 {
        if self.total_decisions == 0 {
            0.0
        } else {
            self.granted as f64 / self.total_decisions as f64
        }
    }
}

/// Lock-light metrics collector shared by the engine
#[derive(Debug, Default)]
pub struct MetricsCollector {
    granted: AtomicU64,
    denied: AtomicU64,
    not_found: AtomicU64,
    /// (sample count, total microseconds)
    latency: Mutex<(u64, u128)>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision outcome and how long it took
    pub fn record_decision(&self, granted: bool, latency: Duration) {
        if granted {
            self.granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }

        let mut latency_total = self.latency.lock();
        latency_total.0 += 1;
        latency_total.1 += latency.as_micros();
    }

    /// Record a guarded retrieval with no value
    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineMetrics {
        let granted = self.granted.load(Ordering::Relaxed);
        let denied = self.denied.load(Ordering::Relaxed);
        let (samples, total_us) = *self.latency.lock();

        EngineMetrics {
            total_decisions: granted + denied,
            granted,
            denied,
            not_found: self.not_found.load(Ordering::Relaxed),
            avg_latency_us: if samples == 0 {
                0.0
            } else {
                total_us as f64 / samples as f64
            },
        }
    }

    pub fn reset(&self) {
        self.granted.store(0, Ordering::Relaxed);
        self.denied.store(0, Ordering::Relaxed);
        self.not_found.store(0, Ordering::Relaxed);
        *self.latency.lock() = (0, 0);
    }
}
