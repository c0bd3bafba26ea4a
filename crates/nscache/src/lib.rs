//! Namespaced invalidation for flat key-value caches.
//!
//! A namespace groups cache entries so they can be invalidated together in
//! constant time by bumping a version counter kept in the cache itself.

pub mod keys;
pub mod memory;
pub mod metrics;
pub mod namespace;

pub use keys::{CONTROL_KEY_PREFIX, INITIAL_VERSION, control_key, effective_key, parse_version};
pub use memory::MemoryClient;
pub use metrics::{MetricsSnapshot, NamespaceMetrics};
pub use namespace::NamespacedCache;
pub use nscache_core::{CacheClient, Error, Result, StoreOptions};
