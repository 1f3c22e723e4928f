//! Cover Cache Entry
//!
//! A [`CacheEntry`] pairs a key with the asset the cache owns for it, plus the
//! bookkeeping reported by [`CoverCache::entry_stats`](crate::CoverCache::entry_stats).
//! Recency order itself lives in the recency queue, not in the entry.

use crate::key::CoverKey;
use std::fmt;
use std::time::{Duration, Instant};

/// Usage of one cached cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStats {
    /// Hits served since the cover was inserted.
    pub hits: u64,

    /// Time since the cover was inserted.
    pub age: Duration,

    /// Time since the cover was last served from the cache.
    pub idle: Duration,
}

/// One cached cover.
pub(crate) struct CacheEntry<A> {
    pub(crate) key: CoverKey,
    pub(crate) asset: A,

    create_time: Instant,
    last_accessed: Instant,
    hits: u64,
}

impl<A> CacheEntry<A> {
    /// Creates a new entry stamped with the current time.
    pub(crate) fn new(key: CoverKey, asset: A) -> Self {
        let now = Instant::now();
        CacheEntry {
            key,
            asset,
            create_time: now,
            last_accessed: now,
            hits: 0,
        }
    }

    /// Records a cache hit on this entry.
    #[inline]
    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.hits += 1;
    }

    /// Snapshot of hits and timings, measured now.
    pub(crate) fn stats(&self) -> EntryStats {
        EntryStats {
            hits: self.hits,
            age: self.create_time.elapsed(),
            idle: self.last_accessed.elapsed(),
        }
    }

    pub(crate) fn into_asset(self) -> A {
        self.asset
    }
}

impl<A> fmt::Debug for CacheEntry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("hits", &self.hits)
            .field("age", &self.create_time.elapsed())
            .finish()
    }
}
