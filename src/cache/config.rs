//! Cache configuration.
//!
//! Controls the compiled-artifact cache and the result cache. Every field is
//! optional in YAML and falls back to the defaults below.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_CACHED_ENTRIES: usize = 1000;
const DEFAULT_ENTRY_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_MINIMUM_HITS_FOR_CACHING: u64 = 2;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_STALE_ENTRY_AGE_SECS: u64 = 5 * 60;
const DEFAULT_RESULT_CACHE_DURATION_SECS: u64 = 5 * 60;
const DEFAULT_MAX_LOCAL_CACHE_ITEMS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound of compiled entries kept after a sweep, per artifact kind.
    ///
    /// Transformers and query text are bounded separately, so
    /// [`CompiledQueryCache::len`](super::CompiledQueryCache::len) can reach
    /// twice this value.
    pub max_cached_entries: usize,
    /// Entries idle longer than this are evicted by the sweep.
    pub entry_timeout_secs: u64,
    /// Accesses needed before a served entry counts as a hit.
    pub minimum_hits_for_caching: u64,
    /// Interval of the background sweep.
    pub cleanup_interval_secs: u64,
    /// Entries older than this and still below the hit threshold are evicted.
    pub stale_entry_age_secs: u64,
    /// Result-cache TTL when the caller gives none.
    pub default_result_cache_duration_secs: u64,
    /// Capacity of the local result tier.
    pub max_local_cache_items: usize,
    /// Track result keys so pattern removal is possible.
    pub track_result_keys: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cached_entries: DEFAULT_MAX_CACHED_ENTRIES,
            entry_timeout_secs: DEFAULT_ENTRY_TIMEOUT_SECS,
            minimum_hits_for_caching: DEFAULT_MINIMUM_HITS_FOR_CACHING,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            stale_entry_age_secs: DEFAULT_STALE_ENTRY_AGE_SECS,
            default_result_cache_duration_secs: DEFAULT_RESULT_CACHE_DURATION_SECS,
            max_local_cache_items: DEFAULT_MAX_LOCAL_CACHE_ITEMS,
            track_result_keys: false,
        }
    }
}

impl CacheConfig {
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_secs(self.entry_timeout_secs)
    }

    /// Sweep interval, clamped to at least one second.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn stale_entry_age(&self) -> Duration {
        Duration::from_secs(self.stale_entry_age_secs)
    }

    pub fn default_result_cache_duration(&self) -> Duration {
        Duration::from_secs(self.default_result_cache_duration_secs)
    }

    /// Returns the local result capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_local_cache_items_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_local_cache_items).unwrap_or(NonZeroUsize::MIN)
    }
}
