//! # Ouroboros Document Store (ouroboros-docstore)
//!
//! An in-memory document table whose query cache stays correct across
//! writes. Instead of dropping every cached result when the data changes, the
//! cache receives the exact delta of each insert, update and remove and
//! patches the affected entries in place.
//!
//! ## Features
//!
//! - Structural cache keys: equal query trees share one cache entry
//! - Bounded cache with insertion-order (default) or LRU eviction
//! - Incremental reconciliation through an explicit observer interface
//! - Uncacheable ad hoc predicates that always scan
//! - Task-safe [`SharedTable`] behind a single async lock
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_docstore::{field, fields, Table, Update};
//! use serde_json::json;
//!
//! # fn main() -> ouroboros_docstore::Result<()> {
//! let mut table = Table::with_capacity("people", 2);
//!
//! let first = table.insert(fields(json!({"name": "Ann", "age": 5})));
//! let young = field("age").lt(10);
//! assert_eq!(table.count(&young)?, 1);
//!
//! // the cached entry for `young` is patched, not rebuilt
//! let second = table.insert(fields(json!({"name": "Bo", "age": 20})));
//! table.update_ids(Update::set(json!({"age": 3})), &[second])?;
//! table.remove_ids(&[first])?;
//!
//! let docs = table.search(&young)?;
//! assert_eq!(docs.len(), 1);
//! assert_eq!(docs[0].id, second);
//! assert_eq!(table.cache_stats().misses, 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod document;
pub mod error;
pub mod query;
pub mod shared;
pub mod storage;
pub mod table;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheMetadata, CacheStats, EvictionPolicy,
    QueryCache,
};
pub use document::{fields, DocId, Document, Fields};
pub use error::{DocStoreError, Result};
pub use query::{field, Comparison, FieldRef, Predicate, Query, QueryKey};
pub use shared::SharedTable;
pub use storage::{DocumentStore, MemoryStorage, Mutation, MutationObserver, NoopObserver};
pub use table::{Table, Update};
