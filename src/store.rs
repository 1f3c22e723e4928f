//! Entry Table
//!
//! The key → asset map and the recency queue, kept in lock-step. Every method
//! takes `&mut self`, and the cache only reaches the store through its mutex,
//! so the two structures are never observed out of sync: outside a critical
//! section `table.keys() == recency.keys()`.
//!
//! Lookups do not change recency. Callers touch explicitly after a hit they
//! actually serve, so failed or cancelled paths never pollute the order.

use crate::asset::Asset;
use crate::entry::CacheEntry;
use crate::key::CoverKey;
use crate::pin::PinSet;
use crate::recency::RecencyQueue;
use std::fmt;
use tracing::warn;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Result of [`EntryStore::insert`].
#[derive(Debug)]
pub(crate) enum InsertOutcome<A> {
    /// The asset is now cached under the key.
    Inserted,
    /// The key was already cached. The store is unchanged; the existing asset
    /// is returned and the offered one is handed back for the caller to dispose.
    AlreadyPresent { existing: A, rejected: A },
}

pub(crate) struct EntryStore<A> {
    table: HashMap<CoverKey, CacheEntry<A>>,
    recency: RecencyQueue,
}

impl<A: Asset> EntryStore<A> {
    pub(crate) fn new() -> Self {
        EntryStore {
            table: HashMap::new(),
            recency: RecencyQueue::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[inline]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&A> {
        self.table.get(key).map(|entry| &entry.asset)
    }

    pub(crate) fn entry(&self, key: &str) -> Option<&CacheEntry<A>> {
        self.table.get(key)
    }

    /// Marks `key` as the most recently used entry. Absent keys are ignored.
    pub(crate) fn touch(&mut self, key: &str) {
        if let Some(entry) = self.table.get_mut(key) {
            entry.touch();
            self.recency.touch(key);
        }
    }

    pub(crate) fn insert(&mut self, key: CoverKey, asset: A) -> InsertOutcome<A> {
        if let Some(entry) = self.table.get(&key) {
            warn!(key = %key, "cover already cached, keeping the existing entry");
            return InsertOutcome::AlreadyPresent {
                existing: entry.asset.clone(),
                rejected: asset,
            };
        }
        self.recency.push(key.clone());
        self.table.insert(key.clone(), CacheEntry::new(key, asset));
        InsertOutcome::Inserted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<A> {
        let entry = self.table.remove(key)?;
        self.recency.remove(key);
        Some(entry.into_asset())
    }

    /// Picks the eviction victim: the oldest key that is not pinned.
    pub(crate) fn oldest_non_pinned(&self, pins: &PinSet, spare_newest: bool) -> Option<CoverKey> {
        self.recency.oldest_non_pinned(pins, spare_newest)
    }

    /// Returns `true` if any entry refers to the same native resource as `asset`.
    pub(crate) fn holds_resource(&self, asset: &A) -> bool {
        self.table
            .values()
            .any(|entry| entry.asset.same_resource(asset))
    }

    /// Removes every entry, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<(CoverKey, A)> {
        let order: Vec<CoverKey> = self.recency.iter_oldest_first().cloned().collect();
        self.recency.clear();
        order
            .into_iter()
            .filter_map(|key| {
                let entry = self.table.remove(&key)?;
                Some((key, entry.into_asset()))
            })
            .collect()
    }

    /// Keys from oldest to newest.
    pub(crate) fn keys_oldest_first(&self) -> Vec<CoverKey> {
        self.recency.iter_oldest_first().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.table.len() == self.recency.len()
            && self.table.keys().all(|key| self.recency.contains(key.as_str()))
    }
}

impl<A> fmt::Debug for EntryStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStore")
            .field("len", &self.table.len())
            .field("recency", &self.recency)
            .finish()
    }
}
