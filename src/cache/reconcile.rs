//! Incremental reconciliation of cached results
//!
//! The query cache observes every store mutation and patches each live entry
//! in place using only the mutation delta:
//!
//! - inserted documents are tested against every entry's predicate and
//!   matching ids are added;
//! - removed ids are dropped from every entry without evaluating anything;
//! - updated documents are re-tested, which adds, drops or keeps each id;
//! - truncation clears the cache, since there is nothing left to patch.
//!
//! Entries unaffected by a mutation keep their id sequence and `version`.

use crate::cache::store::QueryCache;
use crate::document::DocId;
use crate::storage::{Mutation, MutationObserver};
use std::collections::HashSet;
use tracing::debug;

impl MutationObserver for QueryCache {
    fn on_mutation(&mut self, mutation: &Mutation<'_>) {
        let changed = match mutation {
            Mutation::Inserted(docs) => {
                if docs.is_empty() {
                    return;
                }
                self.patch(|entry| entry.absorb_inserted(docs))
            }
            Mutation::Updated(docs) => {
                if docs.is_empty() {
                    return;
                }
                self.patch(|entry| entry.absorb_updated(docs))
            }
            Mutation::Removed(ids) => {
                if ids.is_empty() {
                    return;
                }
                let removed: HashSet<DocId> = ids.iter().copied().collect();
                self.patch(|entry| entry.forget(&removed))
            }
            Mutation::Truncated => {
                self.clear();
                return;
            }
        };

        debug!(
            "Reconciled {} of {} cache entries after {:?} document change(s)",
            changed,
            self.len(),
            mutation.affected().unwrap_or_default()
        );
        self.record_reconciled(changed);
    }
}

impl QueryCache {
    /// Apply `f` to every entry, bumping the version of those it changed
    fn patch<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut crate::cache::CacheEntry) -> bool,
    {
        let mut changed = 0;
        self.for_each_entry(|entry| {
            if f(entry) {
                entry.bump_version();
                changed += 1;
            }
        });
        changed
    }
}
