//! Shared request types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-write options passed through to the backend unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Time-to-live. `None` means the entry never expires.
    #[serde(default)]
    pub ttl: Option<Duration>,
    /// Values at least this many bytes long may be compressed by the backend.
    #[serde(default)]
    pub compress_threshold: Option<usize>,
}

impl StoreOptions {
    /// Options with only a time-to-live.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    /// Set the compression threshold.
    pub fn compress_above(mut self, threshold: usize) -> Self {
        self.compress_threshold = Some(threshold);
        self
    }

    /// TTL in whole seconds, `0` meaning no expiry.
    pub fn ttl_secs(&self) -> u64 {
        match self.ttl {
            // Sub-second TTLs round up so they do not turn into "never expire".
            Some(ttl) if ttl.subsec_nanos() > 0 => ttl.as_secs().saturating_add(1),
            Some(ttl) => ttl.as_secs(),
            None => 0,
        }
    }
}
