//! Cache statistics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters describing how the query cache is being used
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a cached entry
    pub hits: u64,

    /// Lookups of cacheable predicates that had to scan
    pub misses: u64,

    /// Queries with uncacheable predicates (always scanned)
    pub bypasses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Entries dropped to respect capacity
    pub evictions: u64,

    /// Entries whose id sequence was changed by a mutation
    pub reconciled_entries: u64,

    /// Number of times the whole cache was cleared
    pub clears: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage of cacheable lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, bypasses: {}, hit_rate: {:.2}%, entries: {}, evictions: {}, reconciled: {} }}",
            self.hits,
            self.misses,
            self.bypasses,
            self.hit_rate(),
            self.entries,
            self.evictions,
            self.reconciled_entries
        )
    }
}
