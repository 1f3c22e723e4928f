#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Request Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          CoverCache::get_or_load                      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │   no cover file? ──────────────────────────────▶ Fallback(NoSource)  │
//! │   cached and live? ─────────────────────────────▶ Loaded (touch LRU) │
//! │   load in flight? ──▶ join it ──┐                                    │
//! │   otherwise ───────▶ start one ─┴─▶ await ─┬──▶ Loaded (inserted)    │
//! │                                            └──▶ Fallback(reason)     │
//! │                                                                      │
//! │   after insert: evict oldest non-pinned ──▶ DisposalSink             │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Host Integration Points
//!
//! | Trait | Supplied by | Purpose |
//! |-------|-------------|---------|
//! | [`Asset`] | host | The cover type and how to compare native resources |
//! | [`Loader`] | host | Decodes a cover file into an asset |
//! | [`DisposalSink`] | host or [`DisposalQueue`] | Frees evicted covers |
//! | [`LivenessCheck`] | host, optional | Detects handles destroyed elsewhere |
//!
//! ## Modules
//!
//! - [`cache`]: The [`CoverCache`] facade
//! - [`asset`]: Asset, liveness and source descriptor types
//! - [`loader`]: The asynchronous loader trait
//! - [`disposal`]: Disposal sink and the main-thread disposal queue
//! - [`config`]: Cache configuration
//! - [`metrics`]: Counters for monitoring cache behavior
//! - [`error`]: Load errors, fallback reasons and cache errors

/// Cover keys.
///
/// Cheap-to-clone string keys identifying a level's cover.
pub mod key;

/// Asset traits and source descriptors.
pub mod asset;

/// Cache entry type with access bookkeeping.
pub(crate) mod entry;

/// Doubly linked list implementation with in-place editing capabilities.
///
/// **Note**: This module is internal infrastructure. It exposes unsafe raw
/// pointer operations that require careful invariant maintenance.
pub(crate) mod list;

/// Recency order over cached keys.
pub(crate) mod recency;

/// The selected-level pin.
pub(crate) mod pin;

/// Entry table and recency queue kept in lock-step.
pub(crate) mod store;

/// In-flight load registry and request coalescing.
pub(crate) mod coordinator;

/// Capacity enforcement.
pub(crate) mod evict;

/// Error and fallback types.
pub mod error;

/// Asynchronous cover loading.
pub mod loader;

/// Disposal of evicted covers.
pub mod disposal;

/// Cache configuration.
pub mod config;

/// Cache metrics.
pub mod metrics;

/// The cover cache itself.
pub mod cache;

pub use asset::{AlwaysLive, Asset, LivenessCheck, SourceDescriptor};
pub use cache::{Cover, CoverCache};
pub use config::CoverCacheConfig;
pub use disposal::{Disposal, DisposalPump, DisposalQueue, DisposalSink};
pub use entry::EntryStats;
pub use error::{CacheError, FallbackReason, LoadError};
pub use key::CoverKey;
pub use loader::Loader;
pub use metrics::{CacheMetrics, CoverCacheMetrics};
