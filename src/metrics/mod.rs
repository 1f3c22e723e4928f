//! Cover Cache Metrics
//!
//! Counters describing how the cache has been used, reported through the
//! [`CacheMetrics`] trait as a `BTreeMap` so the output order is stable across
//! runs (handy when diffing logs or asserting in tests).
//!
//! Counters are updated under the cache lock together with the state they
//! describe. `disposals` is the exception: disposal happens outside the lock,
//! so it is kept separately and merged into each snapshot.

use crate::error::FallbackReason;
use std::collections::BTreeMap;

/// Counters tracked by a [`CoverCache`](crate::CoverCache).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoverCacheMetrics {
    /// Total number of `get_or_load` calls.
    pub requests: u64,

    /// Requests served straight from the entry table.
    pub cache_hits: u64,

    /// Loads actually started (one per coalesced group).
    pub loads_started: u64,

    /// Requests that attached to a load already in flight.
    pub coalesced_waiters: u64,

    /// Covers inserted into the table.
    pub insertions: u64,

    /// Covers removed by the eviction policy.
    pub evictions: u64,

    /// Covers removed by explicit invalidation or clearing.
    pub invalidations: u64,

    /// Covers handed to the disposal sink.
    pub disposals: u64,

    /// Table hits dropped because their handle was no longer live.
    pub stale_purges: u64,

    /// Duplicate inserts rejected by the table.
    pub precondition_violations: u64,

    /// Requests answered with the fallback cover because the level has no cover file.
    pub fallback_no_source: u64,

    /// Requests answered with the fallback cover because the file was missing.
    pub fallback_not_found: u64,

    /// Requests answered with the fallback cover because they were cancelled.
    pub fallback_cancelled: u64,

    /// Requests answered with the fallback cover because loading failed.
    pub fallback_load_failed: u64,

    /// Requests answered with the fallback cover because the handle was stale.
    pub fallback_stale: u64,
}

impl CoverCacheMetrics {
    /// Creates a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request served from the table.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.cache_hits += 1;
    }

    /// Records a request that had to start a new load.
    pub fn record_load_started(&mut self) {
        self.requests += 1;
        self.loads_started += 1;
    }

    /// Records a request that joined an in-flight load.
    pub fn record_coalesced(&mut self) {
        self.requests += 1;
        self.coalesced_waiters += 1;
    }

    /// Records a request that resolved to the fallback cover.
    ///
    /// Requests rejected before reaching the table (no source, pre-cancelled)
    /// are counted as requests here as well.
    pub fn record_fallback(&mut self, reason: FallbackReason, counts_as_request: bool) {
        if counts_as_request {
            self.requests += 1;
        }
        match reason {
            FallbackReason::NoSource => self.fallback_no_source += 1,
            FallbackReason::NotFound => self.fallback_not_found += 1,
            FallbackReason::Cancelled => self.fallback_cancelled += 1,
            FallbackReason::LoadFailed => self.fallback_load_failed += 1,
            FallbackReason::StaleHandle => self.fallback_stale += 1,
        }
    }

    /// Requests that had to wait on a load, started or joined.
    pub fn misses(&self) -> u64 {
        self.loads_started + self.coalesced_waiters
    }

    /// Total requests answered with the fallback cover.
    pub fn fallbacks(&self) -> u64 {
        self.fallback_no_source
            + self.fallback_not_found
            + self.fallback_cancelled
            + self.fallback_load_failed
            + self.fallback_stale
    }

    /// Ratio of requests served from the table, or 0.0 before the first request.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Ratio of non-hit requests that piggybacked on another load.
    pub fn coalescing_rate(&self) -> f64 {
        let misses = self.misses();
        if misses > 0 {
            self.coalesced_waiters as f64 / misses as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a map with deterministic key order.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert("misses".to_string(), self.misses() as f64);
        metrics.insert("loads_started".to_string(), self.loads_started as f64);
        metrics.insert(
            "coalesced_waiters".to_string(),
            self.coalesced_waiters as f64,
        );
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("invalidations".to_string(), self.invalidations as f64);
        metrics.insert("disposals".to_string(), self.disposals as f64);
        metrics.insert("stale_purges".to_string(), self.stale_purges as f64);
        metrics.insert(
            "precondition_violations".to_string(),
            self.precondition_violations as f64,
        );
        metrics.insert("fallbacks".to_string(), self.fallbacks() as f64);

        // Rates (0.0 to 1.0)
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("coalescing_rate".to_string(), self.coalescing_rate());

        metrics
    }
}

/// Uniform access to cache metrics.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Name identifying the cache implementation.
    fn algorithm_name(&self) -> &'static str;
}
