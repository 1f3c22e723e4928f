//! Example: Browse a simulated song list with a cover cache.
//!
//! Demonstrates the full host integration:
//! - a `Loader` that "decodes" covers off the main loop
//! - a `DisposalQueue` drained once per frame, the way a game engine would
//!   destroy textures on its main thread
//! - the selection pin keeping the highlighted level's cover alive while the
//!   list scrolls far past it
//!
//! Run with:
//! ```
//! RUST_LOG=cover_cache=debug cargo run --example cover_browser
//! ```

use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cover_cache::config::CoverCacheConfig;
use cover_cache::{
    Asset, CacheMetrics, CoverCache, DisposalQueue, LoadError, Loader, SourceDescriptor,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::EnvFilter;

const LEVELS: usize = 120;
const VISIBLE_ROWS: usize = 8;

#[derive(Clone, Debug)]
struct Sprite {
    texture_id: u64,
    alive: Arc<AtomicBool>,
}

impl Asset for Sprite {
    type Texture = u64;

    fn texture(&self) -> Option<u64> {
        Some(self.texture_id)
    }

    fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.alive, &other.alive)
    }
}

/// Pretends to decode a PNG. Every fifth level has no cover on disk.
struct SlowDecoder {
    next_texture: AtomicU64,
}

#[async_trait]
impl Loader<Sprite> for SlowDecoder {
    async fn load_asset(
        &self,
        source: &SourceDescriptor,
        cancel: CancellationToken,
    ) -> Result<Sprite, LoadError> {
        let path = source.path().ok_or(LoadError::NotFound)?;
        if path.to_string_lossy().contains("missing") {
            return Err(LoadError::NotFound);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
        }
        Ok(Sprite {
            texture_id: self.next_texture.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

fn level_source(index: usize) -> SourceDescriptor {
    let file = match index % 5 {
        0 => "missing.png".to_string(),
        _ => format!("cover-{index}.png"),
    };
    SourceDescriptor::new(format!("/songs/level-{index}"), Some(file))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_line_number(false)
        .with_file(false)
        .init();

    let liveness = Arc::new(|sprite: &Sprite| sprite.alive.load(Ordering::Acquire));
    let (queue, mut pump) = DisposalQueue::new(liveness.clone());
    let cache = CoverCache::init_with_liveness(
        CoverCacheConfig { capacity: 24 },
        Arc::new(SlowDecoder {
            next_texture: AtomicU64::new(1),
        }),
        Arc::new(queue),
        liveness,
    );

    // Highlight a level near the top, then scroll all the way down.
    let selected = 3;
    cache.on_selection_changed(format!("level-{selected}"));

    let mut destroyed = 0;
    for top in 0..=LEVELS - VISIBLE_ROWS {
        // Rows scrolled out of view before their cover arrives are cancelled.
        let frame = CancellationToken::new();
        let rows = (top..top + VISIBLE_ROWS).map(|index| {
            let cache = cache.clone();
            let frame = frame.child_token();
            tokio::spawn(async move {
                let key = format!("level-{index}");
                cache.get_or_load(key, &level_source(index), &frame).await
            })
        });
        let covers = futures::future::join_all(rows).await;
        frame.cancel();

        let fallbacks = covers
            .into_iter()
            .filter(|cover| cover.as_ref().map_or(true, |c| c.is_fallback()))
            .count();
        if top % 20 == 0 {
            info!(top, fallbacks, cached = cache.len(), "scrolled");
        }

        // End of frame: the main thread destroys what the cache let go of.
        destroyed += pump.run_pending(|job| {
            job.asset.alive.store(false, Ordering::Release);
        });
    }

    let selected_key = format!("level-{selected}");
    info!(
        pinned = cache.contains(&selected_key),
        destroyed,
        cached = cache.len(),
        "finished browsing"
    );

    cache.shutdown();
    destroyed += pump.run_pending(|job| job.asset.alive.store(false, Ordering::Release));
    info!(destroyed, "shut down");

    for (name, value) in cache.metrics() {
        info!("{} {name}: {value:.2}", cache.algorithm_name());
    }
    Ok(())
}
