//! Document table with a self-reconciling query cache
//!
//! [`Table`] is the entry point for reads and writes. Searches with a
//! cacheable predicate are answered from the table's [`QueryCache`] when
//! possible; on a miss the table scans and installs the result. Every write
//! goes through the [`DocumentStore`] with the cache as its observer, so the
//! cache is patched in the same call that changes the data.

use crate::cache::{CacheConfig, CacheStats, QueryCache};
use crate::document::{DocId, Document, Fields};
use crate::error::{DocStoreError, Result};
use crate::query::{Predicate, QueryKey};
use crate::storage::{DocumentStore, MemoryStorage};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

type Transform = Box<dyn Fn(&mut Fields) + Send + Sync>;

/// How an update changes each selected document
pub enum Update {
    /// Merge these fields into the document, overwriting existing keys
    Fields(Fields),

    /// Run a closure over the document's fields; it may add or delete keys
    Transform(Transform),
}

impl Update {
    /// Merge update from a JSON object literal
    pub fn set(value: Value) -> Self {
        Update::Fields(crate::document::fields(value))
    }

    /// Update that runs `f` over each document's fields
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&mut Fields) + Send + Sync + 'static,
    {
        Update::Transform(Box::new(f))
    }

    fn apply(&self, target: &mut Fields) {
        match self {
            Update::Fields(changes) => {
                for (name, value) in changes {
                    target.insert(name.clone(), value.clone());
                }
            }
            Update::Transform(f) => f(target),
        }
    }
}

impl From<Fields> for Update {
    fn from(fields: Fields) -> Self {
        Update::Fields(fields)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Update::Transform(_) => write!(f, "Transform"),
        }
    }
}

/// A named collection of documents plus its query cache
pub struct Table<S: DocumentStore = MemoryStorage> {
    name: String,
    storage: S,
    cache: QueryCache,
}

impl Table<MemoryStorage> {
    /// In-memory table with the default cache configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CacheConfig::default())
    }

    /// In-memory table whose cache keeps at most `capacity` predicates
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_config(name, CacheConfig::builder().capacity(capacity).build())
    }

    pub fn with_config(name: impl Into<String>, config: CacheConfig) -> Self {
        Self::with_storage(name, MemoryStorage::new(), config)
    }
}

impl<S: DocumentStore> Table<S> {
    /// Table over an existing store.
    ///
    /// The cache starts empty, so documents already in `storage` are picked
    /// up by the first scan of each predicate.
    pub fn with_storage(name: impl Into<String>, storage: S, config: CacheConfig) -> Self {
        let name = name.into();
        info!("Opening table '{}' ({} documents)", name, storage.len());

        Self {
            name,
            storage,
            cache: QueryCache::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert one document and return its id
    pub fn insert(&mut self, fields: Fields) -> DocId {
        self.storage.insert_one(fields, &mut self.cache)
    }

    /// Insert several documents, returning their ids in order
    pub fn insert_multiple<I>(&mut self, docs: I) -> Vec<DocId>
    where
        I: IntoIterator<Item = Fields>,
    {
        let docs: Vec<Fields> = docs.into_iter().collect();
        if docs.is_empty() {
            return Vec::new();
        }
        self.storage.insert(docs, &mut self.cache)
    }

    /// All documents matching `predicate`, ascending by id.
    ///
    /// Cacheable predicates are served from the cache when present and cached
    /// after a miss. Uncacheable predicates always scan.
    pub fn search<P>(&mut self, predicate: &P) -> Result<Vec<Document>>
    where
        P: Predicate + Clone + 'static,
    {
        let Some(key) = predicate.cache_key() else {
            debug!("Uncacheable query on '{}', scanning", self.name);
            self.cache.record_bypass();
            return Ok(self.scan(predicate));
        };

        let cached = self.cache.get(&key).map(<[DocId]>::to_vec);
        if let Some(ids) = cached {
            return self.resolve(&key, &ids);
        }

        let docs = self.scan(predicate);
        let ids = docs.iter().map(|doc| doc.id).collect();
        self.cache.put(key, Arc::new(predicate.clone()), ids);
        Ok(docs)
    }

    /// First matching document (lowest id)
    pub fn get<P>(&mut self, predicate: &P) -> Result<Option<Document>>
    where
        P: Predicate + Clone + 'static,
    {
        if predicate.cache_key().is_none() {
            self.cache.record_bypass();
            return Ok(self
                .storage
                .all()
                .into_iter()
                .find(|doc| predicate.evaluate(doc)));
        }
        Ok(self.search(predicate)?.into_iter().next())
    }

    pub fn get_by_id(&self, id: DocId) -> Option<Document> {
        self.storage.get(id)
    }

    pub fn contains<P>(&mut self, predicate: &P) -> Result<bool>
    where
        P: Predicate + Clone + 'static,
    {
        Ok(self.get(predicate)?.is_some())
    }

    /// True if every id is stored
    pub fn contains_ids(&self, ids: &[DocId]) -> bool {
        ids.iter().all(|id| self.storage.contains(*id))
    }

    pub fn count<P>(&mut self, predicate: &P) -> Result<usize>
    where
        P: Predicate + Clone + 'static,
    {
        Ok(self.search(predicate)?.len())
    }

    /// Apply `update` to every document matching `predicate`
    pub fn update<P>(&mut self, update: Update, predicate: &P) -> Result<Vec<DocId>>
    where
        P: Predicate + Clone + 'static,
    {
        let targets = self.select(predicate)?;
        self.apply_update(&update, targets)
    }

    /// Apply `update` to the documents with the given ids.
    ///
    /// Fails with [`DocStoreError::DocumentNotFound`] before changing anything
    /// if one of the ids is unknown.
    pub fn update_ids(&mut self, update: Update, ids: &[DocId]) -> Result<Vec<DocId>> {
        let targets = self.lookup_all(ids)?;
        self.apply_update(&update, targets)
    }

    /// Remove every document matching `predicate`
    pub fn remove<P>(&mut self, predicate: &P) -> Result<Vec<DocId>>
    where
        P: Predicate + Clone + 'static,
    {
        let ids: Vec<DocId> = self.select(predicate)?.iter().map(|doc| doc.id).collect();
        if ids.is_empty() {
            return Ok(ids);
        }
        self.storage.remove(&ids, &mut self.cache)
    }

    /// Remove documents by id; unknown ids fail the whole call
    pub fn remove_ids(&mut self, ids: &[DocId]) -> Result<Vec<DocId>> {
        let ids: Vec<DocId> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(ids);
        }
        self.storage.remove(&ids, &mut self.cache)
    }

    /// Remove every document and reset id numbering. The cache is cleared.
    pub fn truncate(&mut self) {
        info!("Truncating table '{}'", self.name);
        self.storage.truncate(&mut self.cache);
    }

    /// Every document, ascending by id
    pub fn all(&self) -> Vec<Document> {
        self.storage.all()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Change how many predicates the cache retains
    pub fn configure(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    /// Drop all cached results; the next searches will scan
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Targets of a write by predicate. Uses a cached entry when one exists
    /// but never installs one, so selecting cannot evict another entry.
    fn select<P: Predicate + ?Sized>(&mut self, predicate: &P) -> Result<Vec<Document>> {
        if let Some(key) = predicate.cache_key() {
            if self.cache.contains_key(&key) {
                let ids = self
                    .cache
                    .get(&key)
                    .map(<[DocId]>::to_vec)
                    .unwrap_or_default();
                return self.resolve(&key, &ids);
            }
        }
        Ok(self.scan(predicate))
    }

    fn scan<P: Predicate + ?Sized>(&self, predicate: &P) -> Vec<Document> {
        self.storage
            .all()
            .into_iter()
            .filter(|doc| predicate.evaluate(doc))
            .collect()
    }

    /// Turn cached ids back into documents. A missing id means some mutation
    /// bypassed reconciliation.
    fn resolve(&self, key: &QueryKey, ids: &[DocId]) -> Result<Vec<Document>> {
        self.storage
            .get_many(ids)
            .into_iter()
            .zip(ids)
            .map(|(doc, id)| {
                doc.ok_or_else(|| {
                    error!(
                        "Cache entry {} on table '{}' references missing document {}",
                        key, self.name, id
                    );
                    DocStoreError::StaleCacheEntry {
                        key: key.to_string(),
                        id: *id,
                    }
                })
            })
            .collect()
    }

    fn lookup_all(&self, ids: &[DocId]) -> Result<Vec<Document>> {
        let unique: BTreeSet<DocId> = ids.iter().copied().collect();
        unique
            .into_iter()
            .map(|id| {
                self.storage
                    .get(id)
                    .ok_or(DocStoreError::DocumentNotFound { id })
            })
            .collect()
    }

    fn apply_update(&mut self, update: &Update, targets: Vec<Document>) -> Result<Vec<DocId>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let changes = targets
            .into_iter()
            .map(|mut doc| {
                update.apply(&mut doc.fields);
                (doc.id, doc.fields)
            })
            .collect();

        self.storage.update(changes, &mut self.cache)
    }
}

impl<S: DocumentStore> fmt::Debug for Table<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("documents", &self.storage.len())
            .field("cache", &self.cache)
            .finish()
    }
}
