//! Load Coordination
//!
//! Ensures at most one load per key is in flight. The first request for a
//! missing key registers a [`PendingLoad`] and starts the loader; every later
//! request for the same key attaches to it and awaits the same shared outcome.
//!
//! ```text
//!   request A ──┐                     ┌──▶ A: Loaded(asset)
//!   request B ──┼──▶ PendingLoad ─────┼──▶ B: Loaded(asset)
//!   request C ──┘   (one loader call) └──▶ C: Loaded(asset)
//! ```
//!
//! Each request races its own cancellation token against the shared outcome,
//! so one caller giving up never fails the others. A [`WaiterGuard`] counts the
//! callers still interested; when the last one leaves, the load's own token is
//! cancelled and the registry entry is dropped so a later request starts fresh.
//!
//! Registry entries carry a generation id. Guards only remove the entry they
//! registered, never a newer load for the same key.

use crate::asset::{Asset, SourceDescriptor};
use crate::cache::{CacheInner, Cover};
use crate::error::FallbackReason;
use crate::key::CoverKey;
use crate::store::InsertOutcome;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

type SharedLoad<A> = Shared<BoxFuture<'static, Result<A, FallbackReason>>>;

/// An in-flight load and the callers waiting on it.
pub(crate) struct PendingLoad<A> {
    id: u64,
    outcome: SharedLoad<A>,
    cancel: CancellationToken,
    waiters: usize,
}

/// Registry of in-flight loads, keyed by cover key.
pub(crate) struct PendingLoads<A> {
    loads: HashMap<CoverKey, PendingLoad<A>>,
    next_id: u64,
}

impl<A: Asset> PendingLoads<A> {
    pub(crate) fn new() -> Self {
        PendingLoads {
            loads: HashMap::new(),
            next_id: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.loads.len()
    }

    /// Reserves the id for the next registered load.
    fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    /// Joins the load in flight for `key`, if any.
    fn attach(&mut self, key: &str) -> Option<(u64, SharedLoad<A>)> {
        let load = self.loads.get_mut(key)?;
        load.waiters += 1;
        Some((load.id, load.outcome.clone()))
    }

    fn register(&mut self, key: CoverKey, load: PendingLoad<A>) {
        self.loads.insert(key, load);
    }

    /// Removes the entry for `key` if it is still load `id`.
    ///
    /// The removed entry holds a handle to the shared outcome; drop it only
    /// after releasing the cache lock.
    fn remove(&mut self, key: &str, id: u64) -> Option<PendingLoad<A>> {
        if self.loads.get(key).map(|load| load.id) == Some(id) {
            self.loads.remove(key)
        } else {
            None
        }
    }

    /// Drops one waiter from load `id`. Returns the entry once nobody is left.
    fn detach(&mut self, key: &str, id: u64) -> Option<PendingLoad<A>> {
        let load = self.loads.get_mut(key)?;
        if load.id != id {
            return None;
        }
        load.waiters = load.waiters.saturating_sub(1);
        if load.waiters > 0 {
            return None;
        }
        load.cancel.cancel();
        self.loads.remove(key)
    }

    /// Cancels and removes every in-flight load.
    pub(crate) fn cancel_all(&mut self) -> Vec<PendingLoad<A>> {
        self.loads
            .drain()
            .map(|(_, load)| {
                load.cancel.cancel();
                load
            })
            .collect()
    }
}

impl<A> fmt::Debug for PendingLoads<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoads")
            .field("in_flight", &self.loads.len())
            .finish()
    }
}

/// Held by a caller while it awaits a shared load.
struct WaiterGuard<'a, A: Asset> {
    inner: &'a CacheInner<A>,
    key: &'a str,
    id: u64,
}

impl<A: Asset> Drop for WaiterGuard<'_, A> {
    fn drop(&mut self) {
        let abandoned = self.inner.state.lock().pending.detach(self.key, self.id);
        if abandoned.is_some() {
            debug!(key = self.key, "last waiter left, cancelling cover load");
        }
    }
}

/// Held by the load itself; unregisters it however the load ends.
struct PendingGuard<'a, A: Asset> {
    inner: &'a CacheInner<A>,
    key: &'a str,
    id: u64,
}

impl<A: Asset> Drop for PendingGuard<'_, A> {
    fn drop(&mut self) {
        let finished = self.inner.state.lock().pending.remove(self.key, self.id);
        drop(finished);
    }
}

impl<A: Asset> CacheInner<A> {
    /// Serves one `get_or_load` call.
    pub(crate) async fn request(
        self: &Arc<Self>,
        key: CoverKey,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Cover<A> {
        if source.is_empty() {
            self.state
                .lock()
                .metrics
                .record_fallback(FallbackReason::NoSource, true);
            return Cover::Fallback(FallbackReason::NoSource);
        }
        if cancel.is_cancelled() {
            self.state
                .lock()
                .metrics
                .record_fallback(FallbackReason::Cancelled, true);
            return Cover::Fallback(FallbackReason::Cancelled);
        }

        let (id, outcome) = {
            let mut state = self.state.lock();
            let cached = state.store.get(key.as_str()).cloned();
            match cached {
                Some(asset) if self.liveness.is_live(&asset) => {
                    state.store.touch(key.as_str());
                    state.metrics.record_hit();
                    trace!(key = %key, "cover cache hit");
                    return Cover::Loaded(asset);
                }
                Some(_) => {
                    // Destroyed behind our back; the handle is dead so there
                    // is nothing to dispose.
                    state.store.remove(key.as_str());
                    state.metrics.stale_purges += 1;
                    debug!(key = %key, "purged stale cover");
                }
                None => {}
            }

            if let Some(joined) = state.pending.attach(key.as_str()) {
                state.metrics.record_coalesced();
                trace!(key = %key, "joined in-flight cover load");
                joined
            } else {
                let id = state.pending.next_id();
                let load_cancel = CancellationToken::new();
                let outcome =
                    self.start_load(key.clone(), source.clone(), load_cancel.clone(), id);
                state.pending.register(
                    key.clone(),
                    PendingLoad {
                        id,
                        outcome: outcome.clone(),
                        cancel: load_cancel,
                        waiters: 1,
                    },
                );
                state.metrics.record_load_started();
                debug!(key = %key, id, "started cover load");
                (id, outcome)
            }
        };

        let waiter = WaiterGuard {
            inner: self.as_ref(),
            key: key.as_str(),
            id,
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FallbackReason::Cancelled),
            result = outcome => result,
        };
        drop(waiter);

        match result {
            Ok(asset) => Cover::Loaded(asset),
            Err(reason) => {
                self.state.lock().metrics.record_fallback(reason, false);
                Cover::Fallback(reason)
            }
        }
    }

    /// Starts the loader for `key` in the background and returns its shared outcome.
    ///
    /// Outside a Tokio runtime the load is driven by whoever awaits the outcome.
    fn start_load(
        self: &Arc<Self>,
        key: CoverKey,
        source: SourceDescriptor,
        cancel: CancellationToken,
        id: u64,
    ) -> SharedLoad<A> {
        let load = Arc::clone(self).run_load(key, source, cancel, id);
        match Handle::try_current() {
            Ok(handle) => handle
                .spawn(load)
                .map(|joined| {
                    joined.unwrap_or_else(|err| {
                        warn!(error = %err, "cover load task did not complete");
                        Err(FallbackReason::LoadFailed)
                    })
                })
                .boxed()
                .shared(),
            Err(_) => load.boxed().shared(),
        }
    }

    /// Runs the loader and publishes the result to the entry table.
    async fn run_load(
        self: Arc<Self>,
        key: CoverKey,
        source: SourceDescriptor,
        cancel: CancellationToken,
        id: u64,
    ) -> Result<A, FallbackReason> {
        let _pending = PendingGuard {
            inner: self.as_ref(),
            key: key.as_str(),
            id,
        };

        let asset = match self.loader.load_asset(&source, cancel.clone()).await {
            Ok(asset) => asset,
            Err(err) => {
                let reason = err.fallback_reason();
                match reason {
                    FallbackReason::Cancelled | FallbackReason::NotFound => {
                        debug!(key = %key, error = %err, "cover not loaded")
                    }
                    _ => warn!(key = %key, error = %err, "cover load failed"),
                }
                return Err(reason);
            }
        };

        if !self.liveness.is_live(&asset) {
            warn!(key = %key, "loader returned a dead cover handle");
            return Err(FallbackReason::StaleHandle);
        }

        let mut inserted = false;
        let mut rejected = None;
        let (result, finished) = {
            let mut state = self.state.lock();
            let finished = state.pending.remove(key.as_str(), id);
            let result = if cancel.is_cancelled() {
                rejected = Some(asset);
                Err(FallbackReason::Cancelled)
            } else if state.capacity == 0 {
                Ok(asset)
            } else {
                match state.store.insert(key.clone(), asset.clone()) {
                    InsertOutcome::Inserted => {
                        state.metrics.insertions += 1;
                        inserted = true;
                        Ok(asset)
                    }
                    InsertOutcome::AlreadyPresent {
                        existing,
                        rejected: duplicate,
                    } => {
                        state.metrics.precondition_violations += 1;
                        state.store.touch(key.as_str());
                        if !existing.same_resource(&duplicate) {
                            rejected = Some(duplicate);
                        }
                        Ok(existing)
                    }
                }
            };
            (result, finished)
        };
        drop(finished);

        if let Some(asset) = rejected {
            trace!(key = %key, "disposing cover nobody will use");
            self.release(Some(asset));
        }
        if inserted {
            self.eviction.maybe_evict(&self);
        }
        result
    }
}
