//! Shared, task-safe access to a table
//!
//! Every operation takes the table's write guard for its whole duration, so
//! a mutation and its cache reconciliation, or a search and the cache fill
//! that follows a miss, are never observed half-done.

use crate::cache::{CacheConfig, CacheStats};
use crate::document::{DocId, Document, Fields};
use crate::error::Result;
use crate::query::Predicate;
use crate::storage::{DocumentStore, MemoryStorage};
use crate::table::{Table, Update};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cloneable handle to a table guarded by one collection-wide lock
pub struct SharedTable<S: DocumentStore = MemoryStorage> {
    inner: Arc<RwLock<Table<S>>>,
}

impl<S: DocumentStore> Clone for SharedTable<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedTable<MemoryStorage> {
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self::from_table(Table::with_config(name, config))
    }
}

impl<S: DocumentStore> SharedTable<S> {
    pub fn from_table(table: Table<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub async fn insert(&self, fields: Fields) -> DocId {
        self.inner.write().await.insert(fields)
    }

    pub async fn insert_multiple(&self, docs: Vec<Fields>) -> Vec<DocId> {
        self.inner.write().await.insert_multiple(docs)
    }

    pub async fn search<P>(&self, predicate: &P) -> Result<Vec<Document>>
    where
        P: Predicate + Clone + 'static,
    {
        self.inner.write().await.search(predicate)
    }

    pub async fn get<P>(&self, predicate: &P) -> Result<Option<Document>>
    where
        P: Predicate + Clone + 'static,
    {
        self.inner.write().await.get(predicate)
    }

    pub async fn count<P>(&self, predicate: &P) -> Result<usize>
    where
        P: Predicate + Clone + 'static,
    {
        self.inner.write().await.count(predicate)
    }

    pub async fn update<P>(&self, update: Update, predicate: &P) -> Result<Vec<DocId>>
    where
        P: Predicate + Clone + 'static,
    {
        self.inner.write().await.update(update, predicate)
    }

    pub async fn update_ids(&self, update: Update, ids: &[DocId]) -> Result<Vec<DocId>> {
        self.inner.write().await.update_ids(update, ids)
    }

    pub async fn remove<P>(&self, predicate: &P) -> Result<Vec<DocId>>
    where
        P: Predicate + Clone + 'static,
    {
        self.inner.write().await.remove(predicate)
    }

    pub async fn remove_ids(&self, ids: &[DocId]) -> Result<Vec<DocId>> {
        self.inner.write().await.remove_ids(ids)
    }

    pub async fn truncate(&self) {
        self.inner.write().await.truncate()
    }

    pub async fn configure(&self, capacity: usize) {
        self.inner.write().await.configure(capacity)
    }

    pub async fn all(&self) -> Vec<Document> {
        self.inner.read().await.all()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.read().await.cache_stats()
    }

    /// Run `f` with exclusive access to the table
    pub async fn with_table<R>(&self, f: impl FnOnce(&mut Table<S>) -> R) -> R {
        let mut table = self.inner.write().await;
        f(&mut table)
    }
}
