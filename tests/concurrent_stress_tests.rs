//! Stress Tests for the Cover Cache
//!
//! Many OS threads hammer one cache with a mix of lookups, selection changes,
//! invalidations and capacity changes. These tests verify thread safety and
//! the cache invariants under high contention rather than exact outcomes.

use async_trait::async_trait;
use cover_cache::config::CoverCacheConfig;
use cover_cache::{Asset, CoverCache, LoadError, Loader, SourceDescriptor};
use parking_lot::Mutex;
use scoped_threadpool::Pool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NUM_THREADS: u32 = 8;
const OPS_PER_THREAD: usize = 2_000;
const KEY_SPACE: u64 = 64;

#[derive(Clone, Debug)]
struct Sprite {
    id: u64,
    key: Arc<str>,
    alive: Arc<AtomicBool>,
}

impl Asset for Sprite {
    type Texture = u64;

    fn texture(&self) -> Option<u64> {
        Some(self.id)
    }

    fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.alive, &other.alive)
    }
}

#[derive(Default)]
struct CountingLoader {
    calls: AtomicUsize,
    next_id: AtomicU64,
}

#[async_trait]
impl Loader<Sprite> for CountingLoader {
    async fn load_asset(
        &self,
        source: &SourceDescriptor,
        cancel: CancellationToken,
    ) -> Result<Sprite, LoadError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let key = source
            .base_dir()
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(LoadError::NotFound)?;
        if key.ends_with('7') {
            return Err(LoadError::NotFound);
        }
        tokio::task::yield_now().await;
        Ok(Sprite {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            key: Arc::from(key),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// Disposal sink that destroys sprites and records every id it saw.
#[derive(Default)]
struct Graveyard {
    ids: Mutex<Vec<u64>>,
    double_frees: AtomicUsize,
}

impl Graveyard {
    fn bury(&self, sprite: Sprite) {
        if !sprite.alive.swap(false, Ordering::SeqCst) {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
        }
        self.ids.lock().push(sprite.id);
    }
}

fn make_cache(capacity: usize) -> (CoverCache<Sprite>, Arc<CountingLoader>, Arc<Graveyard>) {
    let loader = Arc::new(CountingLoader::default());
    let graveyard = Arc::new(Graveyard::default());
    let sink = {
        let graveyard = Arc::clone(&graveyard);
        move |sprite: Sprite| graveyard.bury(sprite)
    };
    let cache = CoverCache::init_with_liveness(
        CoverCacheConfig { capacity },
        loader.clone(),
        Arc::new(sink),
        Arc::new(|sprite: &Sprite| sprite.alive.load(Ordering::SeqCst)),
    );
    (cache, loader, graveyard)
}

fn source_for(key: &str) -> SourceDescriptor {
    SourceDescriptor::new(format!("/levels/{key}"), Some("cover.png"))
}

/// Deterministic per-thread key sequence.
fn next_key(state: &mut u64) -> String {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    format!("level-{}", (*state >> 33) % KEY_SPACE)
}

fn assert_invariants(cache: &CoverCache<Sprite>, graveyard: &Graveyard, capacity: usize) {
    assert_eq!(graveyard.double_frees.load(Ordering::SeqCst), 0);

    let ids = graveyard.ids.lock();
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "a sprite was disposed twice");

    assert!(cache.len() <= capacity + 1);
    assert_eq!(cache.pending_loads(), 0);
    for key in cache.keys() {
        let sprite = cache.peek(key.as_str()).unwrap();
        assert!(sprite.alive.load(Ordering::SeqCst), "cached {key} is dead");
        assert_eq!(&*sprite.key, key.as_str());
    }
}

#[test]
fn stress_shared_runtime_high_contention() {
    let capacity = 16;
    let (cache, loader, graveyard) = make_cache(capacity);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();
    let loaded = AtomicUsize::new(0);

    let mut pool = Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = cache.clone();
            let runtime = &runtime;
            let loaded = &loaded;
            scope.execute(move || {
                let mut state = u64::from(t) + 1;
                runtime.block_on(async {
                    for i in 0..OPS_PER_THREAD {
                        let key = next_key(&mut state);
                        match i % 50 {
                            0 => cache.on_selection_changed(key.as_str()),
                            1 => {
                                cache.invalidate(&key);
                            }
                            _ => {
                                let cover = cache
                                    .get_or_load(key.as_str(), &source_for(&key), &CancellationToken::new())
                                    .await;
                                if let Some(sprite) = cover.asset() {
                                    assert_eq!(&*sprite.key, key.as_str());
                                    loaded.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                    }
                });
            });
        }
    });

    assert!(loaded.load(Ordering::Relaxed) > 0);
    assert!(loader.calls.load(Ordering::Relaxed) > 0);
    assert_invariants(&cache, &graveyard, capacity);
}

#[test]
fn stress_without_runtime() {
    let capacity = 8;
    let (cache, _, graveyard) = make_cache(capacity);

    let mut pool = Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = cache.clone();
            scope.execute(move || {
                let mut state = u64::from(t) * 31 + 7;
                for _ in 0..OPS_PER_THREAD / 4 {
                    let key = next_key(&mut state);
                    let cover = futures::executor::block_on(cache.get_or_load(
                        key.as_str(),
                        &source_for(&key),
                        &CancellationToken::new(),
                    ));
                    if let Some(sprite) = cover.asset() {
                        assert_eq!(&*sprite.key, key.as_str());
                    }
                }
            });
        }
    });

    assert_invariants(&cache, &graveyard, capacity);
}

#[test]
fn stress_capacity_changes() {
    let (cache, _, graveyard) = make_cache(32);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    let mut pool = Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = cache.clone();
            let runtime = &runtime;
            scope.execute(move || {
                let mut state = u64::from(t) + 100;
                runtime.block_on(async {
                    for i in 0..OPS_PER_THREAD / 2 {
                        let key = next_key(&mut state);
                        if t == 0 && i % 100 == 0 {
                            cache.configure(4 + (i / 100) % 28);
                        }
                        cache
                            .get_or_load(key.as_str(), &source_for(&key), &CancellationToken::new())
                            .await;
                    }
                });
            });
        }
    });

    cache.configure(4);
    assert_invariants(&cache, &graveyard, 4);
}

#[test]
fn stress_cancellation_storm() {
    let (cache, _, graveyard) = make_cache(16);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    let mut pool = Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = cache.clone();
            let runtime = &runtime;
            scope.execute(move || {
                let mut state = u64::from(t) + 1_000;
                runtime.block_on(async {
                    for i in 0..OPS_PER_THREAD / 2 {
                        let key = next_key(&mut state);
                        let cancel = CancellationToken::new();
                        if i % 3 == 0 {
                            cancel.cancel();
                        }
                        let source = source_for(&key);
                        let request = cache.get_or_load(key.as_str(), &source, &cancel);
                        if i % 5 == 0 {
                            // Dropped mid-flight, like a scrolled-away list item.
                            let _ = tokio::time::timeout(std::time::Duration::ZERO, request).await;
                        } else {
                            request.await;
                        }
                    }
                });
            });
        }
    });

    // Abandoned loads finish in the background; give them a moment.
    runtime.block_on(async {
        for _ in 0..1_000 {
            if cache.pending_loads() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    });
    assert_invariants(&cache, &graveyard, 16);
}
