//! Bounded store of cached predicate results

use crate::cache::{
    config::{CacheConfig, EvictionPolicy},
    entry::CacheEntry,
    types::CacheStats,
};
use crate::document::DocId;
use crate::query::{Predicate, QueryKey};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-table query cache.
///
/// Maps a predicate's [`QueryKey`] to the ids currently matching it. The cache
/// never holds more than `capacity` entries. It is not synchronized; the
/// owning table serializes access together with the mutations that feed
/// [`MutationObserver`](crate::storage::MutationObserver).
pub struct QueryCache {
    /// Cache configuration
    pub(crate) config: CacheConfig,

    /// Main storage: key -> entry
    entries: HashMap<QueryKey, CacheEntry>,

    /// Eviction order, front is evicted first
    order: VecDeque<QueryKey>,

    stats: CacheStats,
}

impl QueryCache {
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing query cache (capacity: {}, eviction: {})",
            config.capacity, config.eviction
        );

        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    /// Create a cache holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig::builder().capacity(capacity).build())
    }

    /// Cached ids for `key`, counting a hit or a miss
    pub fn get(&mut self, key: &QueryKey) -> Option<&[DocId]> {
        if !self.entries.contains_key(key) {
            debug!("Cache miss: {}", key);
            if self.config.enable_metrics {
                self.stats.misses += 1;
            }
            return None;
        }

        if self.config.eviction == EvictionPolicy::LeastRecentlyUsed {
            self.order.retain(|k| k != key);
            self.order.push_back(key.clone());
        }
        if self.config.enable_metrics {
            self.stats.hits += 1;
        }

        let entry = self.entries.get_mut(key)?;
        entry.mark_accessed();
        debug!("Cache hit: {} ({} ids)", key, entry.len());
        Some(entry.ids())
    }

    /// Install or overwrite the entry for `key`.
    ///
    /// A new key arriving at capacity evicts first. With capacity zero nothing
    /// is stored.
    pub fn put(&mut self, key: QueryKey, predicate: Arc<dyn Predicate>, ids: Vec<DocId>) {
        if self.config.capacity == 0 {
            return;
        }

        let entry = CacheEntry::new(key.clone(), predicate, ids);

        if let Some(existing) = self.entries.get_mut(&key) {
            debug!("Replacing cache entry: {}", key);
            *existing = entry;
            if self.config.eviction == EvictionPolicy::LeastRecentlyUsed {
                self.order.retain(|k| k != &key);
                self.order.push_back(key);
            }
            return;
        }

        self.evict_to(self.config.capacity - 1);
        debug!("Caching {} ids for: {}", entry.len(), key);
        self.entries.insert(key.clone(), entry);
        self.order.push_back(key);
        self.stats.entries = self.entries.len();
    }

    /// Drop a single entry
    pub fn remove(&mut self, key: &QueryKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.stats.entries = self.entries.len();
        debug!("Removed cache entry: {}", key);
        Some(entry)
    }

    /// Clear all entries from the cache
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        self.stats.entries = 0;
        if self.config.enable_metrics {
            self.stats.clears += 1;
        }

        info!("Cleared {} entries from query cache", count);
    }

    /// Visit every live entry mutably. Iteration order is unspecified.
    pub fn for_each_entry<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut CacheEntry),
    {
        for entry in self.entries.values_mut() {
            f(entry);
        }
    }

    /// Change the capacity, evicting the oldest entries if it shrinks
    pub fn set_capacity(&mut self, capacity: usize) {
        info!(
            "Reconfiguring query cache capacity: {} -> {}",
            self.config.capacity, capacity
        );
        self.config.capacity = capacity;
        self.evict_to(capacity);
    }

    /// Inspect an entry without counting a hit
    pub fn entry(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in eviction order, next victim first
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.order.iter()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Count a query that skipped the cache
    pub(crate) fn record_bypass(&mut self) {
        if self.config.enable_metrics {
            self.stats.bypasses += 1;
        }
    }

    pub(crate) fn record_reconciled(&mut self, count: usize) {
        if self.config.enable_metrics {
            self.stats.reconciled_entries += count as u64;
        }
    }

    /// Evict from the front of the order until at most `limit` entries remain
    fn evict_to(&mut self, limit: usize) {
        while self.entries.len() > limit {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&key).is_some() {
                debug!("Evicting cache entry: {}", key);
                if self.config.enable_metrics {
                    self.stats.evictions += 1;
                }
            }
        }
        self.stats.entries = self.entries.len();
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("order", &self.order)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{field, Query};

    fn key_for(query: &Query) -> QueryKey {
        query.cache_key().unwrap()
    }

    fn put_query(cache: &mut QueryCache, query: Query, ids: Vec<DocId>) -> QueryKey {
        let key = key_for(&query);
        cache.put(key.clone(), Arc::new(query), ids);
        key
    }

    #[test]
    fn test_basic_put_and_get() {
        let mut cache = QueryCache::with_capacity(10);
        let key = put_query(&mut cache, field("int").eq(1), vec![DocId(2), DocId(1)]);

        assert_eq!(cache.get(&key), Some(&[DocId(1), DocId(2)][..]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = QueryCache::new(CacheConfig::default());
        let key = key_for(&field("nope").exists());

        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_insertion_order_eviction() {
        let mut cache = QueryCache::with_capacity(3);
        let k1 = put_query(&mut cache, field("n").eq(1), vec![]);
        let k2 = put_query(&mut cache, field("n").eq(2), vec![]);
        let k3 = put_query(&mut cache, field("n").eq(3), vec![]);

        // hits do not protect k1 under insertion order
        cache.get(&k1);

        let k4 = put_query(&mut cache, field("n").eq(4), vec![]);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key(&k1));
        assert!(cache.contains_key(&k2));
        assert!(cache.contains_key(&k3));
        assert!(cache.contains_key(&k4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let config = CacheConfig::builder()
            .capacity(3)
            .eviction(EvictionPolicy::LeastRecentlyUsed)
            .build();
        let mut cache = QueryCache::new(config);

        let k1 = put_query(&mut cache, field("n").eq(1), vec![]);
        let k2 = put_query(&mut cache, field("n").eq(2), vec![]);
        put_query(&mut cache, field("n").eq(3), vec![]);

        cache.get(&k1);
        put_query(&mut cache, field("n").eq(4), vec![]);

        assert!(cache.contains_key(&k1));
        assert!(!cache.contains_key(&k2));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = QueryCache::with_capacity(2);
        let k1 = put_query(&mut cache, field("n").eq(1), vec![DocId(1)]);
        let k2 = put_query(&mut cache, field("n").eq(2), vec![]);

        put_query(&mut cache, field("n").eq(1), vec![DocId(5)]);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key(&k2));
        assert_eq!(cache.entry(&k1).unwrap().ids(), &[DocId(5)]);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = QueryCache::new(CacheConfig::disabled());
        let key = put_query(&mut cache, field("n").eq(1), vec![DocId(1)]);

        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_shrinking_capacity_evicts_oldest() {
        let mut cache = QueryCache::with_capacity(4);
        let keys: Vec<QueryKey> = (0..4)
            .map(|i| put_query(&mut cache, field("n").eq(i), vec![]))
            .collect();

        cache.set_capacity(2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
        let remaining: Vec<&QueryKey> = cache.keys().collect();
        assert_eq!(remaining, vec![&keys[2], &keys[3]]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = QueryCache::with_capacity(5);
        let k1 = put_query(&mut cache, field("n").eq(1), vec![]);
        put_query(&mut cache, field("n").eq(2), vec![]);

        assert!(cache.remove(&k1).is_some());
        assert!(cache.remove(&k1).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);
        assert_eq!(cache.stats().clears, 1);
    }

    #[test]
    fn test_for_each_entry_visits_all() {
        let mut cache = QueryCache::with_capacity(5);
        for i in 0..3 {
            put_query(&mut cache, field("n").eq(i), vec![DocId(1)]);
        }

        let mut visited = 0;
        cache.for_each_entry(|entry| {
            assert_eq!(entry.ids(), &[DocId(1)]);
            visited += 1;
        });
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_metrics_disabled() {
        let config = CacheConfig::builder().capacity(2).enable_metrics(false).build();
        let mut cache = QueryCache::new(config);
        let key = put_query(&mut cache, field("n").eq(1), vec![]);

        cache.get(&key);
        cache.get(&key_for(&field("n").eq(2)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }
}
