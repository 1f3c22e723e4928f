//! Eviction Policy
//!
//! Trims the entry table back to capacity by removing the least recently used
//! covers that are not pinned. Runs after every successful insert and after a
//! capacity change.
//!
//! A pass picks victims and removes them under the cache lock, then hands them
//! to the disposal sink with the lock released:
//!
//! ```text
//!   lock ─▶ while len > capacity: remove oldest non-pinned ─▶ unlock
//!                                                              │
//!                                       liveness check ◀───────┘
//!                                             │
//!                                    DisposalSink::schedule_dispose
//! ```
//!
//! At most one pass runs at a time. A trigger that arrives while a pass is
//! running is remembered and served by the running thread before it steps
//! down, so no trigger is ever lost and callers never block on each other.
//!
//! The newest entry is spared while the capacity is non-zero, so a freshly
//! inserted cover is never evicted by its own insert. With a pin in place the
//! table may therefore hold `capacity + 1` covers.

use crate::asset::Asset;
use crate::cache::CacheInner;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

pub(crate) struct EvictionPolicy {
    running: AtomicBool,
    requested: AtomicBool,
}

impl EvictionPolicy {
    pub(crate) fn new() -> Self {
        EvictionPolicy {
            running: AtomicBool::new(false),
            requested: AtomicBool::new(false),
        }
    }

    /// Evicts down to capacity, or defers to the pass already running.
    pub(crate) fn maybe_evict<A: Asset>(&self, inner: &CacheInner<A>) {
        self.requested.store(true, Ordering::SeqCst);
        loop {
            if self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                trace!("eviction already running, trigger deferred");
                return;
            }
            while self.requested.swap(false, Ordering::SeqCst) {
                self.run_pass(inner);
            }
            self.running.store(false, Ordering::SeqCst);
            // A trigger may have landed between the last swap and stepping down.
            // Every access here is SeqCst so this load cannot miss it.
            if !self.requested.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn run_pass<A: Asset>(&self, inner: &CacheInner<A>) -> usize {
        let (evicted, released) = {
            let mut state = inner.state.lock();
            let spare_newest = state.capacity > 0;
            let mut evicted = 0;
            let mut released = Vec::new();
            while state.store.len() > state.capacity {
                let Some(victim) = state.store.oldest_non_pinned(&state.pins, spare_newest) else {
                    break;
                };
                let Some(asset) = state.store.remove(victim.as_str()) else {
                    break;
                };
                evicted += 1;
                trace!(key = %victim, "evicting cover");
                if !state.store.holds_resource(&asset) {
                    released.push(asset);
                }
            }
            state.metrics.evictions += evicted as u64;
            (evicted, released)
        };
        if evicted > 0 {
            debug!(evicted, "evicted covers over capacity");
        }
        inner.release(released);
        evicted
    }
}
