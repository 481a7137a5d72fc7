//! Document storage and mutation notifications
//!
//! A [`DocumentStore`] owns the authoritative documents. Every mutating call
//! takes a [`MutationObserver`] and, once the change is applied, reports the
//! exact [`Mutation`] delta to it before returning. The table passes its query
//! cache as the observer, which is how cached results stay in sync.

use crate::document::{DocId, Document, Fields};
use crate::error::{DocStoreError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// A change that has just been applied to a store
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    /// Newly stored documents with their assigned ids
    Inserted(&'a [Document]),

    /// Documents after replacement of their fields
    Updated(&'a [Document]),

    /// Ids of documents that no longer exist
    Removed(&'a [DocId]),

    /// Every document was removed
    Truncated,
}

impl Mutation<'_> {
    /// Number of documents the mutation touched, `None` for truncation
    pub fn affected(&self) -> Option<usize> {
        match self {
            Mutation::Inserted(docs) | Mutation::Updated(docs) => Some(docs.len()),
            Mutation::Removed(ids) => Some(ids.len()),
            Mutation::Truncated => None,
        }
    }
}

/// Receives the delta of each store mutation.
///
/// Called synchronously after the store's state changed. Implementations must
/// not mutate the store from inside the callback.
pub trait MutationObserver {
    fn on_mutation(&mut self, mutation: &Mutation<'_>);
}

/// Observer that ignores every mutation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MutationObserver for NoopObserver {
    fn on_mutation(&mut self, _mutation: &Mutation<'_>) {}
}

/// Storage interface consumed by [`Table`](crate::table::Table)
pub trait DocumentStore {
    /// Store new documents, assigning ascending fresh ids
    fn insert(&mut self, docs: Vec<Fields>, observer: &mut dyn MutationObserver) -> Vec<DocId>;

    /// Store a single document and return its fresh id
    fn insert_one(&mut self, fields: Fields, observer: &mut dyn MutationObserver) -> DocId;

    /// Replace the fields of existing documents.
    ///
    /// Fails without changing anything if an id is unknown.
    fn update(
        &mut self,
        changes: Vec<(DocId, Fields)>,
        observer: &mut dyn MutationObserver,
    ) -> Result<Vec<DocId>>;

    /// Delete documents by id.
    ///
    /// Fails without changing anything if an id is unknown.
    fn remove(&mut self, ids: &[DocId], observer: &mut dyn MutationObserver) -> Result<Vec<DocId>>;

    /// Delete every document and restart id assignment
    fn truncate(&mut self, observer: &mut dyn MutationObserver);

    /// Every document, ascending by id
    fn all(&self) -> Vec<Document>;

    fn get(&self, id: DocId) -> Option<Document>;

    fn contains(&self, id: DocId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve several ids, preserving order; unknown ids come back as `None`
    fn get_many(&self, ids: &[DocId]) -> Vec<Option<Document>> {
        ids.iter().map(|id| self.get(*id)).collect()
    }
}

/// In-memory document store ordered by id
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    documents: BTreeMap<DocId, Fields>,
    next_id: DocId,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            documents: BTreeMap::new(),
            next_id: DocId::FIRST,
        }
    }

    /// Assign the next id and keep the fields under it
    fn store(&mut self, fields: Fields) -> Document {
        let id = self.next_id;
        self.next_id = id.next();
        self.documents.insert(id, fields.clone());
        Document::new(id, fields)
    }

    fn ensure_known(&self, ids: impl IntoIterator<Item = DocId>) -> Result<()> {
        for id in ids {
            if !self.documents.contains_key(&id) {
                return Err(DocStoreError::DocumentNotFound { id });
            }
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStorage {
    fn insert(&mut self, docs: Vec<Fields>, observer: &mut dyn MutationObserver) -> Vec<DocId> {
        let inserted: Vec<Document> = docs.into_iter().map(|fields| self.store(fields)).collect();

        debug!("Inserted {} documents", inserted.len());
        observer.on_mutation(&Mutation::Inserted(&inserted));

        inserted.into_iter().map(|doc| doc.id).collect()
    }

    fn insert_one(&mut self, fields: Fields, observer: &mut dyn MutationObserver) -> DocId {
        let doc = self.store(fields);
        let id = doc.id;
        debug!("Inserted document {}", id);
        observer.on_mutation(&Mutation::Inserted(std::slice::from_ref(&doc)));
        id
    }

    fn update(
        &mut self,
        changes: Vec<(DocId, Fields)>,
        observer: &mut dyn MutationObserver,
    ) -> Result<Vec<DocId>> {
        self.ensure_known(changes.iter().map(|(id, _)| *id))?;

        let mut updated = Vec::with_capacity(changes.len());
        for (id, fields) in changes {
            self.documents.insert(id, fields.clone());
            updated.push(Document::new(id, fields));
        }

        debug!("Updated {} documents", updated.len());
        observer.on_mutation(&Mutation::Updated(&updated));

        Ok(updated.into_iter().map(|doc| doc.id).collect())
    }

    fn remove(&mut self, ids: &[DocId], observer: &mut dyn MutationObserver) -> Result<Vec<DocId>> {
        self.ensure_known(ids.iter().copied())?;

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if self.documents.remove(id).is_some() {
                removed.push(*id);
            }
        }

        debug!("Removed {} documents", removed.len());
        observer.on_mutation(&Mutation::Removed(&removed));

        Ok(removed)
    }

    fn truncate(&mut self, observer: &mut dyn MutationObserver) {
        self.documents.clear();
        self.next_id = DocId::FIRST;
        observer.on_mutation(&Mutation::Truncated);
    }

    fn all(&self) -> Vec<Document> {
        self.documents
            .iter()
            .map(|(id, fields)| Document::new(*id, fields.clone()))
            .collect()
    }

    fn get(&self, id: DocId) -> Option<Document> {
        self.documents
            .get(&id)
            .map(|fields| Document::new(id, fields.clone()))
    }

    fn contains(&self, id: DocId) -> bool {
        self.documents.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}
