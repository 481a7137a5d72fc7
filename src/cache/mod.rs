//! # Self-reconciling query cache
//!
//! Caches the ids matching each cacheable predicate and keeps them correct
//! across writes instead of invalidating the cache on every mutation.
//!
//! ## Features
//!
//! - **Structural keys**: entries are keyed by [`QueryKey`](crate::query::QueryKey),
//!   so equal query trees share one entry
//! - **Bounded**: at most `capacity` entries, evicted in insertion order
//!   (or LRU, configurable)
//! - **Incremental maintenance**: [`QueryCache`] implements
//!   [`MutationObserver`](crate::storage::MutationObserver) and patches each
//!   entry from the mutation delta alone
//! - **Metrics**: hit/miss/eviction counters in [`CacheStats`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ouroboros_docstore::cache::{CacheConfig, QueryCache};
//! use ouroboros_docstore::document::{fields, DocId, Document};
//! use ouroboros_docstore::query::{field, Predicate};
//! use ouroboros_docstore::storage::{Mutation, MutationObserver};
//! use serde_json::json;
//!
//! let mut cache = QueryCache::new(CacheConfig::builder().capacity(2).build());
//!
//! let query = field("age").lt(10);
//! let key = query.cache_key().unwrap();
//! cache.put(key.clone(), Arc::new(query), vec![DocId(1)]);
//!
//! let young = [Document::new(DocId(2), fields(json!({"age": 3})))];
//! cache.on_mutation(&Mutation::Inserted(&young));
//!
//! assert_eq!(cache.get(&key), Some(&[DocId(1), DocId(2)][..]));
//! ```

pub mod config;
pub mod entry;
pub mod reconcile;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use entry::{CacheEntry, CacheMetadata};
pub use store::QueryCache;
pub use types::CacheStats;
