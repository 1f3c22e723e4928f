//! Cover Cache Keys
//!
//! A [`CoverKey`] identifies one cover (one level) in the cache. Keys are
//! compared by exact string equality and are cheap to clone, since the same
//! key is held by the entry table, the recency queue, the pin and any
//! in-flight load at the same time.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// An immutable, cheaply clonable level identifier.
///
/// # Examples
///
/// ```
/// use cover_cache::CoverKey;
///
/// let key = CoverKey::from("custom_level_ABC123");
/// assert_eq!(key.as_str(), "custom_level_ABC123");
/// assert_eq!(key, CoverKey::from(String::from("custom_level_ABC123")));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoverKey(Arc<str>);

impl CoverKey {
    /// Creates a key from any string-like value.
    pub fn new(id: impl AsRef<str>) -> Self {
        CoverKey(Arc::from(id.as_ref()))
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CoverKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CoverKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CoverKey {
    fn from(id: &str) -> Self {
        CoverKey::new(id)
    }
}

impl From<String> for CoverKey {
    fn from(id: String) -> Self {
        CoverKey(Arc::from(id))
    }
}

impl From<&String> for CoverKey {
    fn from(id: &String) -> Self {
        CoverKey::new(id)
    }
}

impl fmt::Display for CoverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CoverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CoverKey").field(&&*self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "hashbrown")]
    use hashbrown::HashMap;
    #[cfg(not(feature = "hashbrown"))]
    use std::collections::HashMap;

    #[test]
    fn test_key_equality_is_exact() {
        assert_eq!(CoverKey::from("abc"), CoverKey::from("abc"));
        assert_ne!(CoverKey::from("abc"), CoverKey::from("ABC"));
        assert_ne!(CoverKey::from("abc"), CoverKey::from("abc "));
    }

    #[test]
    fn test_borrowed_lookup() {
        let mut map = HashMap::new();
        map.insert(CoverKey::from("level"), 1);
        assert_eq!(map.get("level"), Some(&1));
        assert_eq!(map.get("other"), None);
    }

    #[test]
    fn test_clone_shares_storage() {
        let key = CoverKey::from("shared");
        let clone = key.clone();
        assert!(Arc::ptr_eq(&key.0, &clone.0));
        assert_eq!(format!("{key}"), "shared");
    }
}
