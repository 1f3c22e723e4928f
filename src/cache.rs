//! Cover Cache
//!
//! [`CoverCache`] is the single entry point the host talks to. It ties the
//! entry table, recency queue, pin and pending-load registry together behind
//! one lock and wires in the host's loader, liveness check and disposal sink.
//!
//! # How It Works
//!
//! ```text
//! get_or_load(key, source, cancel)
//!    │
//!    ├─ no cover file / already cancelled ──────────────▶ Fallback
//!    │
//!    ├─ lock ─▶ table hit? ─yes─▶ touch ─────────────────▶ Loaded(asset)
//!    │             │no
//!    │             ├─ load in flight? ─yes─▶ attach ──┐
//!    │             └─ register load, spawn loader ────┤
//!    │                                                 ▼
//!    │                                       await shared outcome
//!    │                                                 │
//!    │            loader done ─▶ lock ─▶ insert ─▶ unlock ─▶ evict ─▶ dispose
//!    ▼
//!  Loaded(asset) | Fallback(reason)
//! ```
//!
//! # Locking
//!
//! One `parking_lot::Mutex` guards all cache state. It is never held across an
//! `.await`, a loader call or a disposal call, so a slow decode or a busy host
//! thread never blocks lookups.
//!
//! # Thread Safety
//!
//! `CoverCache` is a cheap handle (`Arc` inside). Clone it into every task or
//! thread that needs it; all clones share the same cache.

use crate::asset::{AlwaysLive, Asset, LivenessCheck, SourceDescriptor};
use crate::config::CoverCacheConfig;
use crate::coordinator::PendingLoads;
use crate::disposal::DisposalSink;
use crate::entry::EntryStats;
use crate::error::{CacheError, FallbackReason};
use crate::evict::EvictionPolicy;
use crate::key::CoverKey;
use crate::loader::Loader;
use crate::metrics::{CacheMetrics, CoverCacheMetrics};
use crate::pin::PinSet;
use crate::store::{EntryStore, InsertOutcome};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Outcome of a cover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover<A> {
    /// The cover, either cached or freshly loaded.
    Loaded(A),
    /// No cover could be produced; show the level's default cover instead.
    Fallback(FallbackReason),
}

impl<A> Cover<A> {
    /// Returns the loaded asset, if any.
    pub fn asset(&self) -> Option<&A> {
        match self {
            Cover::Loaded(asset) => Some(asset),
            Cover::Fallback(_) => None,
        }
    }

    /// Consumes the outcome and returns the loaded asset, if any.
    pub fn into_asset(self) -> Option<A> {
        match self {
            Cover::Loaded(asset) => Some(asset),
            Cover::Fallback(_) => None,
        }
    }

    /// Returns `true` if the caller should show the fallback cover.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Cover::Fallback(_))
    }

    /// The fallback reason, if this is a fallback.
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Cover::Loaded(_) => None,
            Cover::Fallback(reason) => Some(*reason),
        }
    }

    /// Returns the asset or `fallback` when none was produced.
    pub fn unwrap_or(self, fallback: A) -> A {
        self.into_asset().unwrap_or(fallback)
    }
}

/// Everything guarded by the cache lock.
pub(crate) struct CacheState<A> {
    pub(crate) store: EntryStore<A>,
    pub(crate) pins: PinSet,
    pub(crate) pending: PendingLoads<A>,
    pub(crate) capacity: usize,
    pub(crate) metrics: CoverCacheMetrics,
}

pub(crate) struct CacheInner<A: Asset> {
    pub(crate) state: Mutex<CacheState<A>>,
    pub(crate) loader: Arc<dyn Loader<A>>,
    pub(crate) liveness: Arc<dyn LivenessCheck<A>>,
    pub(crate) disposal: Arc<dyn DisposalSink<A>>,
    pub(crate) eviction: EvictionPolicy,
    disposals: AtomicU64,
}

impl<A: Asset> CacheInner<A> {
    /// Hands removed assets to the disposal sink. Must be called without the lock.
    pub(crate) fn release(&self, assets: impl IntoIterator<Item = A>) {
        for asset in assets {
            if self.liveness.is_live(&asset) {
                self.disposal.schedule_dispose(asset);
                self.disposals.fetch_add(1, Ordering::Relaxed);
            } else {
                trace!("removed cover was already destroyed, nothing to dispose");
            }
        }
    }
}

/// A bounded, concurrency-safe cache of cover assets.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use cover_cache::config::CoverCacheConfig;
/// use cover_cache::{Asset, Cover, CoverCache, LoadError, Loader, SourceDescriptor};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Sprite(Arc<String>);
///
/// impl Asset for Sprite {
///     type Texture = ();
///     fn texture(&self) -> Option<()> { None }
///     fn same_resource(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
/// }
///
/// struct NameLoader;
///
/// #[async_trait]
/// impl Loader<Sprite> for NameLoader {
///     async fn load_asset(&self, source: &SourceDescriptor, _: CancellationToken) -> Result<Sprite, LoadError> {
///         let name = source.file_name().ok_or(LoadError::NotFound)?;
///         Ok(Sprite(Arc::new(name.to_string())))
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let cache = CoverCache::init(
///     CoverCacheConfig { capacity: 2 },
///     Arc::new(NameLoader),
///     Arc::new(|_: Sprite| {}),
/// );
///
/// let source = SourceDescriptor::new("/songs/a", Some("cover.png"));
/// let cover = cache.get_or_load("a", &source, &CancellationToken::new()).await;
/// assert_eq!(cover.asset().map(|s| s.0.as_str()), Some("cover.png"));
/// assert!(cache.contains("a"));
///
/// let missing = SourceDescriptor::new("/songs/b", None::<&str>);
/// assert!(cache.get_or_load("b", &missing, &CancellationToken::new()).await.is_fallback());
/// # });
/// ```
pub struct CoverCache<A: Asset> {
    inner: Arc<CacheInner<A>>,
}

impl<A: Asset> CoverCache<A> {
    /// Creates a cache whose asset handles never go stale.
    pub fn init(
        config: CoverCacheConfig,
        loader: Arc<dyn Loader<A>>,
        disposal: Arc<dyn DisposalSink<A>>,
    ) -> Self {
        Self::init_with_liveness(config, loader, disposal, Arc::new(AlwaysLive))
    }

    /// Creates a cache that checks asset liveness through `liveness`.
    ///
    /// Use this when the host can destroy covers behind the cache's back, for
    /// example on scene reload.
    pub fn init_with_liveness(
        config: CoverCacheConfig,
        loader: Arc<dyn Loader<A>>,
        disposal: Arc<dyn DisposalSink<A>>,
        liveness: Arc<dyn LivenessCheck<A>>,
    ) -> Self {
        let state = CacheState {
            store: EntryStore::new(),
            pins: PinSet::new(),
            pending: PendingLoads::new(),
            capacity: config.capacity,
            metrics: CoverCacheMetrics::new(),
        };
        CoverCache {
            inner: Arc::new(CacheInner {
                state: Mutex::new(state),
                loader,
                liveness,
                disposal,
                eviction: EvictionPolicy::new(),
                disposals: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cover for `key`, loading it from `source` on a miss.
    ///
    /// Concurrent requests for the same key share one load. Each caller's
    /// `cancel` only affects that caller; the load itself is cancelled once
    /// every caller waiting on it has gone.
    ///
    /// Requires a Tokio runtime context to run the load in the background.
    /// Without one the load runs inside the awaiting callers.
    pub async fn get_or_load(
        &self,
        key: impl Into<CoverKey>,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Cover<A> {
        self.inner.request(key.into(), source, cancel).await
    }

    /// Pins `key` as the selected level. Its cover is never evicted while pinned.
    ///
    /// Does not evict or dispose anything by itself.
    pub fn on_selection_changed(&self, key: impl Into<CoverKey>) {
        let key = key.into();
        let previous = self.inner.state.lock().pins.replace(Some(key.clone()));
        trace!(key = %key, previous = ?previous, "selection changed");
    }

    /// Removes the pin, making every cover evictable again.
    pub fn clear_selection(&self) {
        self.inner.state.lock().pins.replace(None);
    }

    /// The currently pinned key.
    pub fn pinned(&self) -> Option<CoverKey> {
        self.inner.state.lock().pins.current().cloned()
    }

    /// Changes the capacity and evicts down to it.
    pub fn configure(&self, capacity: usize) {
        self.inner.state.lock().capacity = capacity;
        debug!(capacity, "cover cache reconfigured");
        self.inner.eviction.maybe_evict(&self.inner);
    }

    /// Inserts a cover that was loaded outside [`get_or_load`](Self::get_or_load).
    ///
    /// If `key` is already cached the existing cover is kept, the offered one is
    /// disposed (unless it is the very same resource) and
    /// [`CacheError::PreconditionViolation`] is returned.
    pub fn insert(&self, key: impl Into<CoverKey>, asset: A) -> Result<(), CacheError> {
        let key = key.into();
        let (result, rejected) = {
            let mut state = self.inner.state.lock();
            match state.store.insert(key.clone(), asset) {
                InsertOutcome::Inserted => {
                    state.metrics.insertions += 1;
                    (Ok(()), None)
                }
                InsertOutcome::AlreadyPresent { existing, rejected } => {
                    state.metrics.precondition_violations += 1;
                    let rejected = (!existing.same_resource(&rejected)).then_some(rejected);
                    (Err(CacheError::PreconditionViolation { key }), rejected)
                }
            }
        };
        self.inner.release(rejected);
        if result.is_ok() {
            self.inner.eviction.maybe_evict(&self.inner);
        }
        result
    }

    /// Returns the cached cover for `key` without loading or touching recency.
    pub fn peek(&self, key: &str) -> Option<A> {
        self.inner.state.lock().store.get(key).cloned()
    }

    /// Removes the cover for `key`, disposing it unless `key` is pinned.
    ///
    /// A pinned cover is still on screen, so it is dropped from the cache but
    /// left to the host.
    pub fn invalidate(&self, key: &str) -> bool {
        let released = {
            let mut state = self.inner.state.lock();
            let Some(asset) = state.store.remove(key) else {
                return false;
            };
            state.metrics.invalidations += 1;
            let in_use = state.pins.contains(key) || state.store.holds_resource(&asset);
            (!in_use).then_some(asset)
        };
        debug!(key, "cover invalidated");
        self.inner.release(released);
        true
    }

    /// Removes every cover, disposing all but the pinned one.
    ///
    /// Loads still in flight are unaffected and will insert when they finish.
    pub fn clear(&self) -> usize {
        let (removed, released) = {
            let mut state = self.inner.state.lock();
            let drained = state.store.drain();
            let removed = drained.len();
            state.metrics.invalidations += removed as u64;
            let released: Vec<A> = drained
                .into_iter()
                .filter(|(key, _)| !state.pins.contains(key.as_str()))
                .map(|(_, asset)| asset)
                .collect();
            (removed, released)
        };
        debug!(removed, "cover cache cleared");
        self.inner.release(released);
        removed
    }

    /// Cancels every in-flight load and clears the cache.
    ///
    /// Callers waiting on a cancelled load receive
    /// [`FallbackReason::Cancelled`].
    pub fn shutdown(&self) -> usize {
        let cancelled = {
            let mut state = self.inner.state.lock();
            state.pending.cancel_all()
        };
        debug!(loads = cancelled.len(), "cancelled in-flight cover loads");
        drop(cancelled);
        self.clear()
    }

    /// Hit count and timings of the cached cover for `key`.
    ///
    /// Does not touch recency.
    pub fn entry_stats(&self, key: &str) -> Option<EntryStats> {
        self.inner.state.lock().store.entry(key).map(|entry| entry.stats())
    }

    /// Number of cached covers.
    pub fn len(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    /// Returns `true` if no cover is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().store.is_empty()
    }

    /// Returns `true` if a cover for `key` is cached. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.state.lock().store.contains(key)
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    /// Number of loads currently in flight.
    pub fn pending_loads(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Cached keys from least to most recently used.
    pub fn keys(&self) -> Vec<CoverKey> {
        self.inner.state.lock().store.keys_oldest_first()
    }

    #[cfg(test)]
    pub(crate) fn inner_for_tests(&self) -> &CacheInner<A> {
        &self.inner
    }

    /// A consistent snapshot of the cache counters.
    pub fn metrics_snapshot(&self) -> CoverCacheMetrics {
        let mut metrics = self.inner.state.lock().metrics.clone();
        metrics.disposals = self.inner.disposals.load(Ordering::Relaxed);
        metrics
    }
}

impl<A: Asset> Clone for CoverCache<A> {
    fn clone(&self) -> Self {
        CoverCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Asset> CacheMetrics for CoverCache<A> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics_snapshot().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "CoverLRU"
    }
}

impl<A: Asset> fmt::Debug for CoverCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CoverCache")
            .field("len", &state.store.len())
            .field("capacity", &state.capacity)
            .field("pinned", &state.pins.current())
            .field("pending_loads", &state.pending.len())
            .finish()
    }
}
