//! Metrics for memcached client observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the memcached client.
#[derive(Debug, Default)]
pub struct MemcacheMetrics {
    /// Retrievals that found a value.
    pub hits: AtomicU64,
    /// Retrievals that found nothing.
    pub misses: AtomicU64,
    /// Successful set/add commands.
    pub stores: AtomicU64,
    /// Commands that failed with an error.
    pub errors: AtomicU64,
    /// Connections (re-)established.
    pub connects: AtomicU64,
    /// Connections dropped after an error.
    pub disconnects: AtomicU64,
    /// Total bytes written.
    pub bytes_written: AtomicU64,
    /// Total value bytes read.
    pub bytes_read: AtomicU64,
}

impl MemcacheMetrics {
    /// Create new metrics instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a retrieval that found a value of `bytes` bytes.
    pub fn record_hit(&self, bytes: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a retrieval that found nothing.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored value.
    pub fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed command.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an opened connection.
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection dropped after an error.
    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes written to a server.
    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub errors: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

impl MetricsSnapshot {
    /// Fraction of retrievals that hit, if any were made.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}
