//! Recency Queue
//!
//! Keeps cover keys in least-recently-used order so the eviction policy can
//! pick victims. The queue only orders keys; the assets themselves live in the
//! entry table, and the two are always updated together under the cache lock.
//!
//! ```text
//!   oldest                                         newest
//!   tail ◀── k1 ◀── k2 ◀── k3 ◀── k4 ◀── head
//!             ▲
//!             └── first victim unless pinned
//! ```
//!
//! Every operation is O(1) except the victim scan, which walks from the oldest
//! key and stops at the first one that is not pinned. With a single pin that
//! is at most two steps.

use crate::key::CoverKey;
use crate::list::{Entry, List};
use crate::pin::PinSet;
use std::fmt;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Least-recently-used ordering of cover keys, each key present at most once.
///
/// # Safety
///
/// `nodes` holds raw pointers into `order`. They are valid as long as:
/// - the pointer was returned by `order.push_front()`
/// - the node has not been removed from `order`
/// - the queue has not been dropped
pub(crate) struct RecencyQueue {
    order: List<CoverKey>,
    nodes: HashMap<CoverKey, *mut Entry<CoverKey>>,
}

// SAFETY: RecencyQueue owns every node its pointers refer to, and all mutation
// goes through &mut self. It is only shared behind the cache mutex.
unsafe impl Send for RecencyQueue {}

// SAFETY: shared references only read through the pointers.
unsafe impl Sync for RecencyQueue {}

impl RecencyQueue {
    pub(crate) fn new() -> Self {
        RecencyQueue {
            order: List::new(),
            nodes: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.order.len(), self.nodes.len());
        self.order.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Appends `key` at the newest position, or moves it there if present.
    pub(crate) fn push(&mut self, key: CoverKey) {
        if let Some(&node) = self.nodes.get(&key) {
            // SAFETY: node comes from our map
            unsafe { self.order.move_to_front(node) };
            return;
        }
        let node = self.order.push_front(key.clone());
        self.nodes.insert(key, node);
    }

    /// Moves `key` to the newest position. Absent keys are ignored.
    ///
    /// Returns `true` if the order changed.
    pub(crate) fn touch(&mut self, key: &str) -> bool {
        let Some(&node) = self.nodes.get(key) else {
            return false;
        };
        // SAFETY: node comes from our map
        unsafe {
            if self.order.is_front(node) {
                return false;
            }
            self.order.move_to_front(node);
        }
        true
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.nodes.remove(key) {
            // SAFETY: node comes from our map and is removed from it first
            Some(node) => unsafe { self.order.remove(node).is_some() },
            None => false,
        }
    }

    /// Returns the oldest key that is not pinned.
    ///
    /// With `spare_newest` set, the newest key is never returned either.
    pub(crate) fn oldest_non_pinned(&self, pins: &PinSet, spare_newest: bool) -> Option<CoverKey> {
        let candidates = if spare_newest {
            self.len().saturating_sub(1)
        } else {
            self.len()
        };
        self.order
            .iter_oldest_first()
            .take(candidates)
            .find(|key| !pins.contains(key.as_str()))
            .cloned()
    }

    /// Keys from oldest to newest.
    pub(crate) fn iter_oldest_first(&self) -> impl Iterator<Item = &CoverKey> + '_ {
        self.order.iter_oldest_first()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
    }
}

impl fmt::Debug for RecencyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter_oldest_first()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(queue: &RecencyQueue) -> Vec<&str> {
        queue.iter_oldest_first().map(CoverKey::as_str).collect()
    }

    fn queue_of(ids: &[&str]) -> RecencyQueue {
        let mut queue = RecencyQueue::new();
        for id in ids {
            queue.push(CoverKey::from(*id));
        }
        queue
    }

    #[test]
    fn test_push_keeps_each_key_once() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.push(CoverKey::from("a"));
        assert_eq!(queue.len(), 3);
        assert_eq!(keys(&queue), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_touch_moves_to_newest() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert!(queue.touch("a"));
        assert_eq!(keys(&queue), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_touch_newest_is_noop() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert!(!queue.touch("c"));
        assert_eq!(keys(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_touch_second_oldest_moves_it() {
        // Only the newest position is exempt from moving, not index 1
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        assert!(queue.touch("b"));
        assert_eq!(keys(&queue), vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_touch_absent_is_noop() {
        let mut queue = queue_of(&["a"]);
        assert!(!queue.touch("missing"));
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains("missing"));
    }

    #[test]
    fn test_remove() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert!(queue.remove("b"));
        assert!(!queue.remove("b"));
        assert_eq!(keys(&queue), vec!["a", "c"]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_oldest_non_pinned_skips_pin() {
        let queue = queue_of(&["a", "b", "c"]);
        let mut pins = PinSet::new();
        assert_eq!(
            queue.oldest_non_pinned(&pins, false),
            Some(CoverKey::from("a"))
        );

        pins.replace(Some(CoverKey::from("a")));
        assert_eq!(
            queue.oldest_non_pinned(&pins, false),
            Some(CoverKey::from("b"))
        );
    }

    #[test]
    fn test_oldest_non_pinned_none_when_all_pinned() {
        let queue = queue_of(&["a"]);
        let mut pins = PinSet::new();
        pins.replace(Some(CoverKey::from("a")));
        assert_eq!(queue.oldest_non_pinned(&pins, false), None);
        assert_eq!(RecencyQueue::new().oldest_non_pinned(&pins, false), None);
    }

    #[test]
    fn test_spare_newest() {
        let queue = queue_of(&["a", "b"]);
        let mut pins = PinSet::new();
        pins.replace(Some(CoverKey::from("a")));
        assert_eq!(queue.oldest_non_pinned(&pins, true), None);
        assert_eq!(
            queue.oldest_non_pinned(&pins, false),
            Some(CoverKey::from("b"))
        );
    }

    #[test]
    fn test_clear() {
        let mut queue = queue_of(&["a", "b"]);
        queue.clear();
        assert_eq!(queue.len(), 0);
        assert!(keys(&queue).is_empty());
        queue.push(CoverKey::from("c"));
        assert_eq!(keys(&queue), vec!["c"]);
    }
}
