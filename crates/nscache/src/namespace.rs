//! Namespaced access to a flat cache.
//!
//! Every namespace owns a version counter stored in the cache itself under
//! `__ns_<namespace>`. Entries are addressed as
//! `__<namespace>_<version>_<key>`, so bumping the counter makes every
//! entry written under the previous version unreachable. Orphaned entries
//! are left for the backend's own eviction to reclaim.

use crate::keys::{self, INITIAL_VERSION};
use crate::metrics::NamespaceMetrics;
use nscache_core::ports::CacheClient;
use nscache_core::{Error, Result, StoreOptions};
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespace layer over a [`CacheClient`].
///
/// Holds no namespace state of its own; every call reads the current
/// version from the backend.
pub struct NamespacedCache<C: ?Sized> {
    client: Arc<C>,
    metrics: Arc<NamespaceMetrics>,
}

impl<C: ?Sized> Clone for NamespacedCache<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<C: CacheClient> NamespacedCache<C> {
    /// Wrap an owned client.
    pub fn new(client: C) -> Self {
        Self::from_arc(Arc::new(client))
    }
}

impl<C: CacheClient + ?Sized> NamespacedCache<C> {
    /// Wrap a shared client.
    pub fn from_arc(client: Arc<C>) -> Self {
        Self {
            client,
            metrics: NamespaceMetrics::new(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Get metrics.
    pub fn metrics(&self) -> &Arc<NamespaceMetrics> {
        &self.metrics
    }

    /// Translate `key` in `namespace` into the backend key for the
    /// namespace's current version, creating the namespace at version 1 if
    /// it has never been seen.
    pub async fn resolve_key(&self, namespace: &str, key: &str) -> Result<String> {
        let control_key = keys::control_key(namespace);
        let initial = INITIAL_VERSION.to_string();

        // Whoever wins the add creates the namespace; everybody else reads it back.
        let created = self
            .client
            .add(&control_key, &initial, &StoreOptions::default())
            .await?;

        let version = if created {
            debug!(namespace, "Created namespace at version {}", INITIAL_VERSION);
            INITIAL_VERSION
        } else {
            self.read_version(namespace, &control_key)
                .await?
                .ok_or_else(|| Error::NamespaceCounterMissing(namespace.to_string()))?
        };

        self.metrics.record_resolution(created);
        Ok(keys::effective_key(namespace, version, key))
    }

    /// Current version of `namespace` without creating it.
    pub async fn current_version(&self, namespace: &str) -> Result<Option<u64>> {
        let control_key = keys::control_key(namespace);
        self.read_version(namespace, &control_key).await
    }

    /// Invalidate every entry of `namespace` by advancing its version.
    ///
    /// Returns the version now in effect. A namespace whose counter does not
    /// exist is set to the initial version; if the backend refuses to store
    /// it the flush fails with [`Error::NamespaceCounterMissing`].
    pub async fn flush(&self, namespace: &str) -> Result<u64> {
        let control_key = keys::control_key(namespace);

        match self.client.incr(&control_key, 1).await? {
            Some(version) => {
                self.metrics.record_flush();
                debug!(namespace, version, "Flushed namespace");
                Ok(version)
            }
            None => {
                let stored = self
                    .client
                    .set(
                        &control_key,
                        &INITIAL_VERSION.to_string(),
                        &StoreOptions::default(),
                    )
                    .await?;
                if !stored {
                    warn!(namespace, "Backend did not store reset namespace counter");
                    return Err(Error::NamespaceCounterMissing(namespace.to_string()));
                }
                self.metrics.record_counter_reset();
                debug!(namespace, "Flushed namespace without counter, reset to initial version");
                Ok(INITIAL_VERSION)
            }
        }
    }

    /// Get the value stored for `key`.
    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.get(&nk).await
    }

    /// Set the value for `key` with default options.
    pub async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<bool> {
        self.set_with(namespace, key, value, &StoreOptions::default())
            .await
    }

    /// Set the value for `key`.
    pub async fn set_with(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        options: &StoreOptions,
    ) -> Result<bool> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.set(&nk, value, options).await
    }

    /// Set `key` only if it is not already set, with default options.
    pub async fn add(&self, namespace: &str, key: &str, value: &str) -> Result<bool> {
        self.add_with(namespace, key, value, &StoreOptions::default())
            .await
    }

    /// Set `key` only if it is not already set.
    pub async fn add_with(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        options: &StoreOptions,
    ) -> Result<bool> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.add(&nk, value, options).await
    }

    /// Increment `key` by `amount`.
    pub async fn incr(&self, namespace: &str, key: &str, amount: u64) -> Result<Option<u64>> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.incr(&nk, amount).await
    }

    /// Increment `key` by one.
    pub async fn incr_one(&self, namespace: &str, key: &str) -> Result<Option<u64>> {
        self.incr(namespace, key, 1).await
    }

    /// Decrement `key` by `amount`.
    pub async fn decr(&self, namespace: &str, key: &str, amount: u64) -> Result<Option<u64>> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.decr(&nk, amount).await
    }

    /// Decrement `key` by one.
    pub async fn decr_one(&self, namespace: &str, key: &str) -> Result<Option<u64>> {
        self.decr(namespace, key, 1).await
    }

    /// Delete `key` from the current version of `namespace`.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let nk = self.resolve_key(namespace, key).await?;
        self.client.delete(&nk).await
    }

    async fn read_version(&self, namespace: &str, control_key: &str) -> Result<Option<u64>> {
        let Some(raw) = self.client.get(control_key).await? else {
            return Ok(None);
        };
        keys::parse_version(&raw)
            .map(Some)
            .ok_or_else(|| Error::CorruptNamespaceCounter {
                namespace: namespace.to_string(),
                value: raw,
            })
    }
}
