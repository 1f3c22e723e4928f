//! Cover Cache Configuration
//!
//! Configuration structs have public fields for simple instantiation, with a
//! [`Default`] matching what a song browser typically needs.
//!
//! # Sizing Guidelines
//!
//! `capacity` counts covers, not bytes. A cover is a small texture (a few
//! hundred kilobytes once decoded), and a song list shows a screenful of them
//! at a time, so a few dozen entries keeps scrolling smooth without holding on
//! to every cover the player has ever seen:
//!
//! ```text
//! Texture memory ≈ capacity × width × height × 4 bytes
//! 50 covers × 256 × 256 × 4 ≈ 13MB
//! ```
//!
//! The selected level's cover is never evicted, so the cache can hold one
//! entry more than `capacity` while everything else is pinned down to size.
//!
//! A `capacity` of 0 disables retention: every request loads the cover again
//! and hands it to the caller without caching it.
//!
//! # Examples
//!
//! ```
//! use cover_cache::config::CoverCacheConfig;
//!
//! let config = CoverCacheConfig { capacity: 100 };
//! assert_eq!(config.capacity, 100);
//!
//! assert_eq!(CoverCacheConfig::default().capacity, 50);
//! ```

use std::fmt;

/// Default number of covers kept in memory.
pub const DEFAULT_CAPACITY: usize = 50;

/// Configuration for a [`CoverCache`](crate::CoverCache).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CoverCacheConfig {
    /// Maximum number of covers retained once eviction settles.
    /// The pinned cover may keep the cache one above this bound.
    pub capacity: usize,
}

impl Default for CoverCacheConfig {
    fn default() -> Self {
        CoverCacheConfig {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl fmt::Debug for CoverCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverCacheConfig")
            .field("capacity", &self.capacity)
            .finish()
    }
}
