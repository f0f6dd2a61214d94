//! Compiled-artifact cache
//!
//! Stores compiled transformers ([`CompiledQuery`]) and query text
//! ([`QueryText`]) under the specification fingerprint.
//!
//! Each key owns a slot. Slots are created atomically through the map's
//! entry API and the build runs under the slot's own lock, so concurrent
//! callers for one key wait for the first build instead of racing it, and
//! all of them receive the same `Arc`. Callers for other keys are not
//! blocked.
//!
//! A periodic sweep, started with [`CompiledQueryCache::start`], evicts
//! entries that were built but never reused, entries idle past the timeout,
//! and the coldest entries beyond the size bound.

use super::config::CacheConfig;
use super::keys::KeyGenerator;
use super::lock::mutex_lock;
use crate::core::{Queryable, SpecError, SpecResult};
use crate::specification::{CompiledQuery, Criteria, Specification};
use crate::translate::{QueryText, SqlTranslator};
use dashmap::DashMap;
use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const SOURCE: &str = "cache::compiled";

type Artifact = Arc<dyn Any + Send + Sync>;

struct Slot {
    value: Mutex<Option<Artifact>>,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
    hits: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            value: Mutex::new(None),
            created_at: now,
            last_accessed: Mutex::new(now),
            hits: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        *mutex_lock(&self.last_accessed, SOURCE, "touch") = Instant::now();
    }

    fn last_accessed(&self) -> Instant {
        *mutex_lock(&self.last_accessed, SOURCE, "last_accessed")
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache effectiveness
///
/// An access to a stored entry counts as a hit only once the entry has been
/// accessed `minimum_hits_for_caching` times; earlier accesses count as
/// misses although the stored value was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStatistics {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// One keyed store of slots
#[derive(Default)]
struct SlotStore {
    entries: DashMap<String, Arc<Slot>>,
}

struct Candidate {
    key: String,
    slot: Arc<Slot>,
    last_accessed: Instant,
    hot: bool,
}

impl SlotStore {
    fn get_or_build<V, F>(
        &self,
        key: &str,
        counters: &Counters,
        minimum_hits: u64,
        build: F,
    ) -> SpecResult<Arc<V>>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> SpecResult<V>,
    {
        // Clone the slot out so no map guard is held while building
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone();

        let mut value = mutex_lock(&slot.value, SOURCE, "get_or_build");
        slot.touch();

        if let Some(existing) = value.as_ref() {
            let hits = slot.hits.fetch_add(1, Ordering::Relaxed) + 1;
            if hits >= minimum_hits {
                counters.hits.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.misses.fetch_add(1, Ordering::Relaxed);
            }
            debug!(key, hits, "compiled cache hit");
            return existing
                .clone()
                .downcast::<V>()
                .map_err(|_| SpecError::Cache {
                    message: format!("entry '{}' holds a different artifact type", key),
                });
        }

        counters.misses.fetch_add(1, Ordering::Relaxed);
        let built = match build() {
            Ok(built) => Arc::new(built),
            Err(err) => {
                drop(value);
                // Keep the empty slot only while other callers wait on it
                self.entries.remove_if(key, |_, current| {
                    Arc::ptr_eq(current, &slot) && Arc::strong_count(current) == 2
                });
                return Err(err);
            }
        };
        counters.builds.fetch_add(1, Ordering::Relaxed);
        *value = Some(built.clone() as Artifact);
        debug!(key, "compiled cache build");
        Ok(built)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !keep(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        doomed
            .into_iter()
            .filter(|key| self.entries.remove(key).is_some())
            .count()
    }

    fn sweep(&self, config: &CacheConfig, now: Instant) -> usize {
        let minimum_hits = config.minimum_hits_for_caching;
        let stale_age = config.stale_entry_age();
        let timeout = config.entry_timeout();

        // Snapshot first; removal happens one key at a time below
        let snapshot: Vec<Candidate> = self
            .entries
            .iter()
            .map(|entry| {
                let slot = entry.value().clone();
                Candidate {
                    key: entry.key().clone(),
                    last_accessed: slot.last_accessed(),
                    hot: slot.hits.load(Ordering::Relaxed) >= minimum_hits,
                    slot,
                }
            })
            .collect();

        let (expired, mut survivors): (Vec<Candidate>, Vec<Candidate>) =
            snapshot.into_iter().partition(|candidate| {
                let age = now.saturating_duration_since(candidate.slot.created_at);
                let idle = now.saturating_duration_since(candidate.last_accessed);
                (age > stale_age && !candidate.hot) || idle > timeout
            });

        let mut doomed = expired;
        if survivors.len() > config.max_cached_entries {
            // Cold entries go first, then the least recently used
            survivors.sort_by_key(|candidate| (candidate.hot, candidate.last_accessed));
            let excess = survivors.len() - config.max_cached_entries;
            doomed.extend(survivors.drain(..excess));
        }

        let mut evicted = 0;
        for candidate in doomed {
            let removed = self
                .entries
                .remove_if(&candidate.key, |_, slot| Arc::ptr_eq(slot, &candidate.slot));
            if removed.is_some() {
                debug!(key = %candidate.key, "compiled cache eviction");
                evicted += 1;
            }
        }
        evicted
    }
}

/// Build-once-per-key store of compiled transformers and query text
pub struct CompiledQueryCache {
    config: CacheConfig,
    translator: SqlTranslator,
    transformers: SlotStore,
    texts: SlotStore,
    counters: Counters,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CompiledQueryCache {
    /// Create a cache without a background sweep
    pub fn new(config: CacheConfig) -> Self {
        Self::with_translator(config, SqlTranslator::default())
    }

    pub fn with_translator(config: CacheConfig, translator: SqlTranslator) -> Self {
        Self {
            config,
            translator,
            transformers: SlotStore::default(),
            texts: SlotStore::default(),
            counters: Counters::default(),
            sweeper: Mutex::new(None),
        }
    }

    /// Create a shared cache and start its periodic sweep
    ///
    /// Must be called from within a Tokio runtime. The sweep task holds only
    /// a weak reference and ends when the cache is dropped or shut down.
    pub fn start(config: CacheConfig) -> Arc<Self> {
        Self::start_with_translator(config, SqlTranslator::default())
    }

    pub fn start_with_translator(config: CacheConfig, translator: SqlTranslator) -> Arc<Self> {
        let cache = Arc::new(Self::with_translator(config, translator));
        let interval = cache.config.cleanup_interval();
        let handle = tokio::spawn(sweep_loop(Arc::downgrade(&cache), interval));
        *mutex_lock(&cache.sweeper, SOURCE, "start") = Some(handle);
        info!(
            interval_secs = interval.as_secs(),
            max_entries = cache.config.max_cached_entries,
            "compiled query cache sweep started"
        );
        cache
    }

    /// Stop the periodic sweep; the cache stays usable
    pub fn shutdown(&self) {
        if let Some(handle) = mutex_lock(&self.sweeper, SOURCE, "shutdown").take() {
            handle.abort();
            info!("compiled query cache sweep stopped");
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Compiled transformer for a specification, built at most once per key
    pub fn get_or_add_transformer<T, S>(&self, spec: &S) -> SpecResult<Arc<CompiledQuery<T>>>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
    {
        self.get_or_add_transformer_with(spec, || CompiledQuery::build(spec))
    }

    /// Like [`get_or_add_transformer`](Self::get_or_add_transformer) with a custom build
    pub fn get_or_add_transformer_with<T, S, F>(
        &self,
        spec: &S,
        build: F,
    ) -> SpecResult<Arc<CompiledQuery<T>>>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
        F: FnOnce() -> SpecResult<CompiledQuery<T>>,
    {
        let key = KeyGenerator::generate::<T, S>(spec)?;
        self.transformers.get_or_build(
            &key,
            &self.counters,
            self.config.minimum_hits_for_caching,
            build,
        )
    }

    /// Query text for a specification, translated at most once per key
    ///
    /// Fails with `UnsupportedSpecification` when the criteria is a function.
    pub fn get_or_add_text<T, S>(&self, spec: &S) -> SpecResult<Arc<QueryText>>
    where
        T: Queryable,
        S: Specification<T> + ?Sized,
    {
        if let Some(Criteria::Function(function)) = spec.criteria() {
            return Err(SpecError::UnsupportedSpecification {
                specification: spec.name().to_string(),
                message: format!(
                    "function criteria '{}' has no textual form",
                    function.label()
                ),
            });
        }
        let key = KeyGenerator::generate::<T, S>(spec)?;
        self.texts.get_or_build(
            &key,
            &self.counters,
            self.config.minimum_hits_for_caching,
            || self.translator.translate_specification::<T, S>(spec),
        )
    }

    /// Remove every entry built for `T`
    pub fn invalidate_for_type<T: Queryable>(&self) -> usize {
        let keep = |key: &str| !KeyGenerator::belongs_to::<T>(key);
        let removed = self.transformers.retain(keep) + self.texts.retain(keep);
        self.counters
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(
            entity = KeyGenerator::type_identity::<T>(),
            removed, "compiled cache invalidated for type"
        );
        removed
    }

    /// Remove every entry
    pub fn invalidate_all(&self) -> usize {
        let removed = self.transformers.retain(|_| false) + self.texts.retain(|_| false);
        self.counters
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, "compiled cache cleared");
        removed
    }

    /// Run one sweep now and return the number of evicted entries
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let evicted = self.transformers.sweep(&self.config, now) + self.texts.sweep(&self.config, now);
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        if evicted > 0 {
            info!(
                evicted,
                remaining = self.len(),
                "compiled query cache sweep evicted entries"
            );
        }
        evicted
    }

    /// Stored entries across both artifact kinds
    pub fn len(&self) -> usize {
        self.transformers.len() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Drop for CompiledQueryCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn sweep_loop(cache: Weak<CompiledQueryCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(cache) = cache.upgrade() else {
            break;
        };
        cache.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::BaseSpecification;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct Item {
        rank: i64,
    }

    crate::impl_queryable!(Item, "items", { rank });

    fn spec(rank: i64) -> BaseSpecification<Item> {
        BaseSpecification::matching(move |i| i.field("rank").equals(rank))
    }

    #[test]
    fn test_same_spec_returns_same_transformer() {
        let cache = CompiledQueryCache::new(CacheConfig::default());
        let first = cache.get_or_add_transformer(&spec(1)).unwrap();
        let second = cache.get_or_add_transformer(&spec(1)).unwrap();
        let other = cache.get_or_add_transformer(&spec(2)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.statistics().builds, 2);
    }

    #[test]
    fn test_hits_below_threshold_count_as_misses() {
        let cache = CompiledQueryCache::new(CacheConfig {
            minimum_hits_for_caching: 2,
            ..Default::default()
        });
        let s = spec(1);
        cache.get_or_add_transformer(&s).unwrap();
        cache.get_or_add_transformer(&s).unwrap();
        let stats = cache.statistics();
        assert_eq!((stats.hits, stats.misses), (0, 2));

        cache.get_or_add_transformer(&s).unwrap();
        let stats = cache.statistics();
        assert_eq!((stats.hits, stats.misses), (1, 2));
    }

    #[test]
    fn test_failed_build_stores_nothing() {
        let cache = CompiledQueryCache::new(CacheConfig::default());
        let s = spec(1);
        let err = cache
            .get_or_add_transformer_with(&s, || Err(SpecError::unsupported("boom")))
            .unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedOperation { .. }));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.statistics().entries, 0);

        let calls = AtomicUsize::new(0);
        cache
            .get_or_add_transformer_with(&s, || {
                calls.fetch_add(1, Ordering::SeqCst);
                CompiledQuery::build(&s)
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_text_for_function_criteria_is_unsupported() {
        let cache = CompiledQueryCache::new(CacheConfig::default());
        let s = BaseSpecification::<Item>::new().with_function("positive", |i: &Item| i.rank > 0);
        let err = cache.get_or_add_text(&s).unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedSpecification { .. }));
        assert!(cache.get_or_add_transformer(&s).is_ok());
    }

    #[test]
    fn test_text_is_cached() {
        let cache = CompiledQueryCache::new(CacheConfig::default());
        let first = cache.get_or_add_text(&spec(3)).unwrap();
        let second = cache.get_or_add_text(&spec(3)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.sql, "SELECT * FROM items WHERE rank = @p0");
    }

    #[test]
    fn test_sweep_evicts_cold_stale_entries_first() {
        let cache = CompiledQueryCache::new(CacheConfig {
            stale_entry_age_secs: 0,
            minimum_hits_for_caching: 2,
            ..Default::default()
        });
        let hot = spec(1);
        for _ in 0..3 {
            cache.get_or_add_transformer(&hot).unwrap();
        }
        cache.get_or_add_transformer(&spec(2)).unwrap();
        cache.get_or_add_transformer(&spec(3)).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        let again = cache.get_or_add_transformer(&hot).unwrap();
        assert_eq!(cache.statistics().builds, 3);
        drop(again);
    }

    #[test]
    fn test_invalidate_for_type_keeps_other_types() {
        #[derive(Clone)]
        struct Other {
            rank: i64,
        }
        crate::impl_queryable!(Other, "others", { rank });

        let cache = CompiledQueryCache::new(CacheConfig::default());
        cache.get_or_add_transformer(&spec(1)).unwrap();
        cache.get_or_add_text(&spec(1)).unwrap();
        cache
            .get_or_add_transformer(&BaseSpecification::<Other>::new())
            .unwrap();

        assert_eq!(cache.invalidate_for_type::<Item>(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_bound_applies_per_artifact_kind() {
        let cache = CompiledQueryCache::new(CacheConfig {
            max_cached_entries: 1,
            ..Default::default()
        });
        for rank in 1..=2 {
            cache.get_or_add_transformer(&spec(rank)).unwrap();
            cache.get_or_add_text(&spec(rank)).unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 2);
    }
}
