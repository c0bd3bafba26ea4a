//! Counters for namespace activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the namespace layer.
#[derive(Debug, Default)]
pub struct NamespaceMetrics {
    /// Effective keys resolved.
    pub resolutions: AtomicU64,
    /// Namespaces created by a winning `add` on the control key.
    pub namespaces_created: AtomicU64,
    /// Flushes that advanced an existing counter.
    pub flushes: AtomicU64,
    /// Flushes that found no counter and reset it to the initial version.
    pub counter_resets: AtomicU64,
}

impl NamespaceMetrics {
    /// Create new metrics instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a resolved key, and a created namespace if `created`.
    pub fn record_resolution(&self, created: bool) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        if created {
            self.namespaces_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a flush that advanced a counter.
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush that reset a missing counter.
    pub fn record_counter_reset(&self) {
        self.counter_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            namespaces_created: self.namespaces_created.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            counter_resets: self.counter_resets.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub resolutions: u64,
    pub namespaces_created: u64,
    pub flushes: u64,
    pub counter_resets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = NamespaceMetrics::new();
        metrics.record_resolution(true);
        metrics.record_resolution(false);
        metrics.record_flush();
        metrics.record_counter_reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.resolutions, 2);
        assert_eq!(snap.namespaces_created, 1);
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.counter_resets, 1);
    }
}
