//! Disposal of Native Resources
//!
//! Covers are native objects (a sprite plus its texture) that can only be
//! destroyed on the host's main thread. The cache never frees anything itself:
//! once an asset has been removed from every cache structure it is handed to a
//! [`DisposalSink`], always outside the cache lock.
//!
//! [`DisposalQueue`] is a ready-made sink for hosts with a "run later on thread
//! X" primitive: the cache side enqueues, and the host thread drains the
//! queue through a [`DisposalPump`].
//!
//! ```text
//!  worker / runtime threads              host main thread
//!  ────────────────────────              ─────────────────
//!  evict ─▶ DisposalQueue ──channel──▶ DisposalPump::run_pending(|job| destroy(job))
//! ```

use crate::asset::{Asset, LivenessCheck};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::trace;

/// Frees the native resources of assets the cache no longer owns.
///
/// Implementations must tolerate assets whose handle is already dead and treat
/// them as a no-op.
pub trait DisposalSink<A>: Send + Sync {
    /// Schedules release of `asset` and its backing texture.
    fn schedule_dispose(&self, asset: A);
}

impl<A, F> DisposalSink<A> for F
where
    F: Fn(A) + Send + Sync,
{
    fn schedule_dispose(&self, asset: A) {
        self(asset)
    }
}

/// One pending release: the asset and the texture it was backed by.
///
/// The texture handle is captured when the job is queued, so the host can
/// destroy both even if the asset no longer answers for its texture by then.
pub struct Disposal<A: Asset> {
    /// The asset to destroy.
    pub asset: A,
    /// Its backing texture, if any.
    pub texture: Option<A::Texture>,
}

impl<A: Asset> fmt::Debug for Disposal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposal")
            .field("has_texture", &self.texture.is_some())
            .finish()
    }
}

/// Sending half of a disposal channel. Clone it freely.
pub struct DisposalQueue<A: Asset> {
    tx: mpsc::UnboundedSender<Disposal<A>>,
}

impl<A: Asset> DisposalQueue<A> {
    /// Creates a queue and the pump the host thread drains it with.
    ///
    /// `liveness` is consulted by the pump right before each job runs, since a
    /// handle can die between eviction and the host getting around to it.
    pub fn new(liveness: Arc<dyn LivenessCheck<A>>) -> (Self, DisposalPump<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DisposalQueue { tx }, DisposalPump { rx, liveness })
    }
}

impl<A: Asset> Clone for DisposalQueue<A> {
    fn clone(&self) -> Self {
        DisposalQueue {
            tx: self.tx.clone(),
        }
    }
}

impl<A: Asset> DisposalSink<A> for DisposalQueue<A> {
    fn schedule_dispose(&self, asset: A) {
        let texture = asset.texture();
        if self.tx.send(Disposal { asset, texture }).is_err() {
            // Pump is gone, so the host has torn down and the handles with it.
            trace!("disposal pump closed, dropping job");
        }
    }
}

impl<A: Asset> fmt::Debug for DisposalQueue<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Receiving half of a disposal channel, owned by the host thread.
pub struct DisposalPump<A: Asset> {
    rx: mpsc::UnboundedReceiver<Disposal<A>>,
    liveness: Arc<dyn LivenessCheck<A>>,
}

impl<A: Asset> DisposalPump<A> {
    /// Runs every job queued so far and returns how many were destroyed.
    ///
    /// Jobs whose asset is no longer live are skipped. Never blocks.
    pub fn run_pending<F>(&mut self, mut destroy: F) -> usize
    where
        F: FnMut(Disposal<A>),
    {
        let mut destroyed = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    if self.liveness.is_live(&job.asset) {
                        destroy(job);
                        destroyed += 1;
                    } else {
                        trace!("skipping disposal of a dead handle");
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return destroyed,
            }
        }
    }

    /// Waits for the next live job.
    ///
    /// Returns `None` once every [`DisposalQueue`] has been dropped and the
    /// channel is drained.
    pub async fn next(&mut self) -> Option<Disposal<A>> {
        while let Some(job) = self.rx.recv().await {
            if self.liveness.is_live(&job.asset) {
                return Some(job);
            }
            trace!("skipping disposal of a dead handle");
        }
        None
    }
}

impl<A: Asset> fmt::Debug for DisposalPump<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalPump").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AlwaysLive;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone)]
    struct Sprite {
        id: u32,
        alive: Arc<AtomicBool>,
    }

    impl Sprite {
        fn new(id: u32) -> Self {
            Sprite {
                id,
                alive: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    impl Asset for Sprite {
        type Texture = u32;

        fn texture(&self) -> Option<u32> {
            Some(self.id + 1000)
        }

        fn same_resource(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.alive, &other.alive)
        }
    }

    fn sprite_liveness() -> Arc<dyn LivenessCheck<Sprite>> {
        Arc::new(|s: &Sprite| s.alive.load(Ordering::SeqCst))
    }

    #[test]
    fn test_pump_runs_jobs_in_order_with_textures() {
        let (queue, mut pump) = DisposalQueue::new(sprite_liveness());
        queue.schedule_dispose(Sprite::new(1));
        queue.clone().schedule_dispose(Sprite::new(2));

        let mut seen = Vec::new();
        let destroyed = pump.run_pending(|job| seen.push((job.asset.id, job.texture)));
        assert_eq!(destroyed, 2);
        assert_eq!(seen, vec![(1, Some(1001)), (2, Some(1002))]);

        assert_eq!(pump.run_pending(|_| panic!("queue should be empty")), 0);
    }

    #[test]
    fn test_pump_skips_dead_handles() {
        let (queue, mut pump) = DisposalQueue::new(sprite_liveness());
        let dead = Sprite::new(1);
        dead.alive.store(false, Ordering::SeqCst);
        queue.schedule_dispose(dead);
        queue.schedule_dispose(Sprite::new(2));

        let mut seen = Vec::new();
        assert_eq!(pump.run_pending(|job| seen.push(job.asset.id)), 1);
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn test_send_after_pump_dropped_is_silent() {
        let (queue, pump) = DisposalQueue::<Sprite>::new(Arc::new(AlwaysLive));
        drop(pump);
        queue.schedule_dispose(Sprite::new(1));
    }

    #[tokio::test]
    async fn test_next_ends_when_queues_dropped() {
        let (queue, mut pump) = DisposalQueue::new(sprite_liveness());
        queue.schedule_dispose(Sprite::new(7));
        drop(queue);

        assert_eq!(pump.next().await.map(|job| job.asset.id), Some(7));
        assert!(pump.next().await.is_none());
    }

    #[test]
    fn test_closure_sink() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink = {
            let count = Arc::clone(&count);
            move |_: Sprite| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        sink.schedule_dispose(Sprite::new(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
