//! Port traits.
//!
//! `CacheClient` is the boundary between the namespace layer and whatever
//! flat key-value cache sits underneath it.

use crate::Result;
use crate::types::StoreOptions;
use async_trait::async_trait;
use std::sync::Arc;

/// A flat key-value cache with per-key expiry and atomic counters.
///
/// Misses are reported as `Ok(None)` or `Ok(false)`; `Err` is reserved for
/// calls that failed.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` unconditionally. Returns whether the backend stored it.
    async fn set(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool>;

    /// Store `value` only if `key` is absent. Returns `false` when it exists.
    async fn add(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool>;

    /// Atomically increment a decimal value. `None` when the key is absent.
    async fn incr(&self, key: &str, amount: u64) -> Result<Option<u64>>;

    /// Atomically decrement a decimal value. `None` when the key is absent.
    async fn decr(&self, key: &str, amount: u64) -> Result<Option<u64>>;

    /// Remove `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

#[async_trait]
impl<C: CacheClient + ?Sized> CacheClient for Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        (**self).set(key, value, options).await
    }

    async fn add(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        (**self).add(key, value, options).await
    }

    async fn incr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        (**self).incr(key, amount).await
    }

    async fn decr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        (**self).decr(key, amount).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key).await
    }
}
