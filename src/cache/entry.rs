//! Cache entries: a predicate and the ids currently known to match it

use crate::document::{DocId, Document};
use crate::query::{Predicate, QueryKey};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A cached predicate result.
///
/// `ids` is kept in ascending order, the same order a full scan yields.
#[derive(Clone)]
pub struct CacheEntry {
    /// The cache key
    pub key: QueryKey,

    predicate: Arc<dyn Predicate>,

    ids: Vec<DocId>,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create an entry from a scan result.
    ///
    /// `ids` must be the matches of `predicate`; it is sorted here.
    pub fn new(key: QueryKey, predicate: Arc<dyn Predicate>, mut ids: Vec<DocId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        let now = Utc::now();

        Self {
            key,
            predicate,
            ids,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                access_count: 0,
                version: 1,
            },
        }
    }

    /// Matching ids in ascending order
    pub fn ids(&self) -> &[DocId] {
        &self.ids
    }

    pub fn predicate(&self) -> &dyn Predicate {
        self.predicate.as_ref()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Add matching new documents. Returns true if the sequence changed.
    pub(crate) fn absorb_inserted(&mut self, docs: &[Document]) -> bool {
        let mut changed = false;
        for doc in docs {
            if self.predicate.evaluate(doc) {
                changed |= self.insert_id(doc.id);
            }
        }
        changed
    }

    /// Re-test updated documents and flip membership where needed
    pub(crate) fn absorb_updated(&mut self, docs: &[Document]) -> bool {
        let mut changed = false;
        for doc in docs {
            if self.predicate.evaluate(doc) {
                changed |= self.insert_id(doc.id);
            } else {
                changed |= self.remove_id(doc.id);
            }
        }
        changed
    }

    /// Drop removed ids. The predicate is not consulted.
    pub(crate) fn forget(&mut self, removed: &HashSet<DocId>) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| !removed.contains(id));
        self.ids.len() != before
    }

    /// Record that a reconciliation changed the id sequence
    pub(crate) fn bump_version(&mut self) {
        self.metadata.version += 1;
    }

    fn insert_id(&mut self, id: DocId) -> bool {
        // fresh inserts always carry the largest id
        if self.ids.last().map_or(true, |last| *last < id) {
            self.ids.push(id);
            return true;
        }
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    fn remove_id(&mut self, id: DocId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("ids", &self.ids)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last hit (for LRU tracking)
    pub accessed_at: DateTime<Utc>,

    /// Number of cache hits served by this entry
    pub access_count: u64,

    /// Starts at 1, incremented whenever a mutation changed `ids`
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fields;
    use crate::query::field;
    use serde_json::json;

    fn age_entry(ids: Vec<DocId>) -> CacheEntry {
        let query = field("age").lt(10);
        let key = query.cache_key().unwrap();
        CacheEntry::new(key, Arc::new(query), ids)
    }

    fn person(id: u64, age: i64) -> Document {
        Document::new(DocId(id), fields(json!({ "age": age })))
    }

    #[test]
    fn test_new_entry_sorts_ids() {
        let entry = age_entry(vec![DocId(3), DocId(1), DocId(2), DocId(1)]);
        assert_eq!(entry.ids(), &[DocId(1), DocId(2), DocId(3)]);
        assert_eq!(entry.metadata.version, 1);
        assert_eq!(entry.metadata.access_count, 0);
    }

    #[test]
    fn test_absorb_inserted_only_matches() {
        let mut entry = age_entry(vec![DocId(1)]);

        assert!(!entry.absorb_inserted(&[person(2, 20)]));
        assert_eq!(entry.ids(), &[DocId(1)]);

        assert!(entry.absorb_inserted(&[person(3, 4), person(4, 40), person(5, 1)]));
        assert_eq!(entry.ids(), &[DocId(1), DocId(3), DocId(5)]);
    }

    #[test]
    fn test_absorb_updated_flips_membership() {
        let mut entry = age_entry(vec![DocId(1), DocId(4)]);

        // moves in, keeps ascending order
        assert!(entry.absorb_updated(&[person(2, 3)]));
        assert_eq!(entry.ids(), &[DocId(1), DocId(2), DocId(4)]);

        // moves out
        assert!(entry.absorb_updated(&[person(1, 50)]));
        assert_eq!(entry.ids(), &[DocId(2), DocId(4)]);

        // stays in, stays out
        assert!(!entry.absorb_updated(&[person(2, 7), person(9, 99)]));
        assert_eq!(entry.ids(), &[DocId(2), DocId(4)]);
    }

    #[test]
    fn test_forget_removed_ids() {
        let mut entry = age_entry(vec![DocId(1), DocId(2), DocId(3)]);
        let removed: HashSet<DocId> = [DocId(2), DocId(8)].into_iter().collect();

        assert!(entry.forget(&removed));
        assert_eq!(entry.ids(), &[DocId(1), DocId(3)]);
        assert!(!entry.forget(&removed));
    }

    #[test]
    fn test_mark_accessed() {
        let mut entry = age_entry(vec![]);
        let initial_time = entry.metadata.accessed_at;

        entry.mark_accessed();

        assert_eq!(entry.metadata.access_count, 1);
        assert!(entry.metadata.accessed_at >= initial_time);
        assert!(entry.is_empty());
    }

    #[test]
    fn test_contains_and_debug() {
        let entry = age_entry(vec![DocId(5)]);
        assert!(entry.contains(DocId(5)));
        assert!(!entry.contains(DocId(6)));
        assert_eq!(entry.len(), 1);
        assert!(format!("{:?}", entry).contains("CacheEntry"));
    }
}
