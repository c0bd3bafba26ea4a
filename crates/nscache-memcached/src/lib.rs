//! memcached backend for nscache.
//!
//! Implements [`nscache_core::CacheClient`] over the memcached text protocol
//! so the namespace layer can run against one or more memcached servers.

mod client;
pub mod compression;
pub mod config;
pub mod health;
pub mod metrics;
pub mod protocol;

pub use client::{Connection, MemcacheClient};
pub use config::MemcacheConfig;
pub use health::{HealthCheck, HealthStatus, NodeHealth};
pub use metrics::{MemcacheMetrics, MetricsSnapshot};
