//! In-process cache client with memcached semantics.
//!
//! Used for local development and as the backend in tests.

use async_trait::async_trait;
use nscache_core::ports::CacheClient;
use nscache_core::{Error, Result, StoreOptions};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, options: &StoreOptions) -> Self {
        Self {
            value: value.to_string(),
            expires_at: options
                .ttl
                .filter(|ttl| !ttl.is_zero())
                // A deadline past what `Instant` can represent never arrives.
                .and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Memory-backed [`CacheClient`].
#[derive(Debug, Default)]
pub struct MemoryClient {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryClient {
    /// Create an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, including orphaned ones.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether no live entry remains.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn apply_delta(&self, key: &str, delta: Delta) -> Result<Option<u64>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            entries.remove(key);
            return Ok(None);
        }

        let current: u64 = entry
            .value
            .trim()
            .parse()
            .map_err(|_| Error::NonNumericValue(key.to_string()))?;

        let next = match delta {
            Delta::Incr(amount) => current.wrapping_add(amount),
            Delta::Decr(amount) => current.saturating_sub(amount),
        };
        entry.value = next.to_string();
        Ok(Some(next))
    }
}

#[derive(Debug, Clone, Copy)]
enum Delta {
    Incr(u64),
    Decr(u64),
}

#[async_trait]
impl CacheClient for MemoryClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry::new(value, options));
        Ok(true)
    }

    async fn add(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value, options));
        Ok(true)
    }

    async fn incr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.apply_delta(key, Delta::Incr(amount)).await
    }

    async fn decr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.apply_delta(key, Delta::Decr(amount)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some_and(|e| !e.is_expired(now)))
    }
}
