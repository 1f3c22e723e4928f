//! Error Types
//!
//! Loading a cover can fail in a handful of ways, none of them fatal. Every
//! failure ends with the caller showing the fallback cover, so the request path
//! only carries a small [`FallbackReason`]. The richer [`LoadError`] is what
//! loaders return, and [`CacheError`] reports misuse of the low-level API.

use crate::key::CoverKey;
use thiserror::Error;

/// Failure reported by a [`Loader`](crate::Loader).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source does not resolve to an existing file.
    #[error("cover source not found")]
    NotFound,

    /// The load observed its cancellation token.
    #[error("cover load cancelled")]
    Cancelled,

    /// The loader finished without producing an asset.
    #[error("cover loader produced no asset")]
    Empty,

    /// The image could not be decoded.
    #[error("failed to decode cover: {0}")]
    Decode(String),

    /// Reading the image failed.
    #[error("failed to read cover")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Maps the error onto the reason handed to waiting callers.
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            LoadError::NotFound => FallbackReason::NotFound,
            LoadError::Cancelled => FallbackReason::Cancelled,
            LoadError::Empty | LoadError::Decode(_) | LoadError::Io(_) => {
                FallbackReason::LoadFailed
            }
        }
    }
}

/// Why a request resolved to the fallback cover instead of a cached one.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// The level declares no cover file.
    #[error("level has no cover file")]
    NoSource,

    /// The cover file does not exist.
    #[error("cover file not found")]
    NotFound,

    /// The request, or every request sharing its load, was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The loader failed to read or decode the cover.
    #[error("cover failed to load")]
    LoadFailed,

    /// The loaded handle was already destroyed when the load completed.
    #[error("loaded cover was no longer live")]
    StaleHandle,
}

/// Misuse of the cache's low-level API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A cover was inserted for a key that already has one.
    ///
    /// Loads for the same key are coalesced, so this only happens when a caller
    /// bypasses [`get_or_load`](crate::CoverCache::get_or_load). The existing
    /// entry is kept.
    #[error("cover for {key} is already cached")]
    PreconditionViolation {
        /// Key that was already present.
        key: CoverKey,
    },
}
