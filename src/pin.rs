//! Selection Pin
//!
//! The level the player is looking at must keep its cover, no matter how many
//! other covers scroll past. The pin holds at most one key; eviction skips it.
//! Moving the pin never evicts anything by itself, it only changes which key
//! is exempt on the next eviction pass.

use crate::key::CoverKey;

/// Zero-or-one key exempt from eviction.
#[derive(Debug, Default, Clone)]
pub(crate) struct PinSet {
    selected: Option<CoverKey>,
}

impl PinSet {
    pub(crate) fn new() -> Self {
        PinSet::default()
    }

    /// Replaces the pinned key and returns the previous one.
    pub(crate) fn replace(&mut self, key: Option<CoverKey>) -> Option<CoverKey> {
        std::mem::replace(&mut self.selected, key)
    }

    #[inline]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.selected.as_ref().is_some_and(|pinned| pinned.as_str() == key)
    }

    #[inline]
    pub(crate) fn current(&self) -> Option<&CoverKey> {
        self.selected.as_ref()
    }
}
