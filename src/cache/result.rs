//! Two-tier result cache
//!
//! Lookup goes local LRU first, then the optional shared tier. A shared hit
//! back-fills the local tier; a full miss runs the factory and stores the
//! value in both tiers.
//!
//! Concurrent misses for the same key are not de-duplicated: each caller
//! runs its own factory and the last store wins. Factories are expected to
//! be cheap and idempotent.
//!
//! With `track_result_keys`, every key this node stores is remembered until
//! it expires, is removed, or (without a shared tier) falls out of the LRU.
//! Expired keys are pruned once the set outgrows twice the local capacity.

use super::config::CacheConfig;
use super::keys::KeyGenerator;
use super::lock::mutex_lock;
use crate::core::{Queryable, SpecError, SpecResult};
use crate::specification::Specification;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

const SOURCE: &str = "cache::result";

/// Shared cache tier reachable from several processes
///
/// Values travel as JSON bytes. Implementations report their own failures
/// through `anyhow`; the result cache surfaces them as [`SpecError::Cache`].
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local [`DistributedCache`], for tests and single-node setups
#[derive(Default)]
pub struct InMemoryDistributedCache {
    entries: DashMap<String, (Vec<u8>, Instant)>,
}

impl InMemoryDistributedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DistributedCache for InMemoryDistributedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (bytes, expires_at) = entry.value();
            if *expires_at > now {
                return Ok(Some(bytes.clone()));
            }
        }
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

struct LocalEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

pub struct ResultCache {
    local: Mutex<LruCache<String, LocalEntry>>,
    shared: Option<Arc<dyn DistributedCache>>,
    default_ttl: Duration,
    tracked: Option<DashMap<String, Instant>>,
    track_limit: usize,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            local: Mutex::new(LruCache::new(config.max_local_cache_items_non_zero())),
            shared: None,
            default_ttl: config.default_result_cache_duration(),
            tracked: config.track_result_keys.then(DashMap::new),
            track_limit: config.max_local_cache_items.max(1).saturating_mul(2),
        }
    }

    /// Attach a shared tier
    pub fn with_shared(mut self, shared: Arc<dyn DistributedCache>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Cached value for `key`, or the factory's value stored under it
    ///
    /// `ttl` defaults to the configured result cache duration. A factory
    /// error is returned as [`SpecError::Factory`] and nothing is stored.
    pub async fn get_or_set<V, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> SpecResult<V>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if key.is_empty() {
            return Err(SpecError::invalid("key", "cache key must not be empty"));
        }
        let ttl = ttl.unwrap_or(self.default_ttl);

        if let Some(value) = self.local_get::<V>(key)? {
            debug!(key, "result cache local hit");
            return Ok(value);
        }

        if let Some(shared) = &self.shared {
            let bytes = shared.get(key).await.map_err(shared_error)?;
            if let Some(bytes) = bytes {
                let value: V = serde_json::from_slice(&bytes)?;
                self.store_local(key, value.clone(), ttl);
                debug!(key, "result cache shared hit");
                return Ok(value);
            }
        }

        debug!(key, "result cache miss");
        let value = factory().await.map_err(SpecError::Factory)?;

        if let Some(shared) = &self.shared {
            let bytes = serde_json::to_vec(&value)?;
            shared.set(key, bytes, ttl).await.map_err(shared_error)?;
        }
        self.store_local(key, value.clone(), ttl);
        Ok(value)
    }

    /// [`get_or_set`](Self::get_or_set) keyed by the specification fingerprint
    pub async fn get_or_set_for_specification<T, S, V, F, Fut>(
        &self,
        spec: &S,
        factory: F,
        ttl: Option<Duration>,
    ) -> SpecResult<V>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let key = KeyGenerator::result_key::<T, S>(spec)?;
        self.get_or_set(&key, factory, ttl).await
    }

    /// Evict `key` from both tiers
    pub async fn remove(&self, key: &str) -> SpecResult<()> {
        mutex_lock(&self.local, SOURCE, "remove").pop(key);
        self.untrack(key);
        if let Some(shared) = &self.shared {
            shared.remove(key).await.map_err(shared_error)?;
        }
        debug!(key, "result cache removed");
        Ok(())
    }

    /// Evict every tracked key matching a `*` glob
    ///
    /// Only available when `track_result_keys` is enabled; otherwise fails
    /// with `UnsupportedOperation` since neither tier can enumerate keys.
    pub async fn remove_by_pattern(&self, pattern: &str) -> SpecResult<usize> {
        let Some(tracked) = &self.tracked else {
            return Err(SpecError::unsupported(
                "remove_by_pattern requires track_result_keys",
            ));
        };

        let matcher = glob_regex(pattern)?;
        let matching: Vec<String> = tracked
            .iter()
            .filter(|key| matcher.is_match(key.key()))
            .map(|key| key.key().clone())
            .collect();

        for key in &matching {
            self.remove(key).await?;
        }
        debug!(pattern, removed = matching.len(), "result cache pattern removal");
        Ok(matching.len())
    }

    /// Entries currently held by the local tier, expired ones included
    pub fn local_len(&self) -> usize {
        mutex_lock(&self.local, SOURCE, "local_len").len()
    }

    fn local_get<V: Clone + 'static>(&self, key: &str) -> SpecResult<Option<V>> {
        let mut local = mutex_lock(&self.local, SOURCE, "local_get");
        let expired = match local.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return entry
                    .value
                    .downcast_ref::<V>()
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| SpecError::Cache {
                        message: format!("entry '{}' holds a different value type", key),
                    });
            }
            Some(_) => true,
        };
        if expired {
            local.pop(key);
            drop(local);
            // The shared copy was written no later than the local one
            self.untrack(key);
        }
        Ok(None)
    }

    /// Store into the local tier and track the key
    fn store_local<V: Send + Sync + 'static>(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let entry = LocalEntry {
            value: Arc::new(value),
            expires_at,
        };
        let evicted = mutex_lock(&self.local, SOURCE, "store_local").push(key.to_string(), entry);

        if let Some((evicted, _)) = evicted {
            if evicted != key && self.shared.is_none() {
                self.untrack(&evicted);
            }
        }
        self.track(key, expires_at);
    }

    fn track(&self, key: &str, expires_at: Instant) {
        let Some(tracked) = &self.tracked else {
            return;
        };
        tracked.insert(key.to_string(), expires_at);
        if tracked.len() > self.track_limit {
            let now = Instant::now();
            tracked.retain(|_, expires_at| *expires_at > now);
        }
    }

    fn untrack(&self, key: &str) {
        if let Some(tracked) = &self.tracked {
            tracked.remove(key);
        }
    }
}

fn shared_error(err: anyhow::Error) -> SpecError {
    SpecError::Cache {
        message: format!("shared tier: {:#}", err),
    }
}

fn glob_regex(pattern: &str) -> SpecResult<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body))
        .map_err(|e| SpecError::invalid("pattern", e.to_string()))
}
