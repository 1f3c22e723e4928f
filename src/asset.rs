//! Asset Capabilities
//!
//! The cache never decodes images or frees native objects itself. It talks to
//! the host through a few small capabilities:
//!
//! - [`Asset`]: the loaded cover plus its backing texture handle
//! - [`LivenessCheck`]: whether a handle still refers to a live native object
//! - [`SourceDescriptor`]: where a cover lives, resolved by the host
//!
//! Liveness is only consulted at two points: before a freshly loaded asset is
//! inserted and before a removed asset is handed to disposal. Cache hits also
//! drop entries whose handle was destroyed behind the cache's back.

use std::path::{Path, PathBuf};

/// A loaded cover owned by the cache once inserted.
///
/// Implementations are expected to be cheap handles (an `Arc`, an index into a
/// host object table, ...). Cloning a handle never duplicates the native
/// resource, which is why the cache asks [`same_resource`](Asset::same_resource)
/// before disposing anything.
pub trait Asset: Clone + Send + Sync + 'static {
    /// Handle to the texture backing this asset.
    type Texture: Send + 'static;

    /// Returns the backing texture, if the asset has one.
    fn texture(&self) -> Option<Self::Texture>;

    /// Returns `true` if both handles refer to the same native resource.
    fn same_resource(&self, other: &Self) -> bool;
}

/// Tells whether an asset handle still refers to a valid native object.
///
/// Handles can be invalidated by teardown outside the cache, for example when
/// the host reloads a scene.
pub trait LivenessCheck<A>: Send + Sync {
    /// Returns `true` if `asset` can still be used.
    fn is_live(&self, asset: &A) -> bool;
}

impl<A, F> LivenessCheck<A> for F
where
    F: Fn(&A) -> bool + Send + Sync,
{
    fn is_live(&self, asset: &A) -> bool {
        self(asset)
    }
}

/// Liveness check for hosts whose handles can never go stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLive;

impl<A> LivenessCheck<A> for AlwaysLive {
    #[inline]
    fn is_live(&self, _asset: &A) -> bool {
        true
    }
}

/// Where a cover image comes from.
///
/// The host resolves the level directory; the cover file name comes from the
/// level's metadata and may be missing or empty, in which case the cache
/// answers with the fallback cover without doing any work.
///
/// # Examples
///
/// ```
/// use cover_cache::SourceDescriptor;
/// use std::path::Path;
///
/// let source = SourceDescriptor::new("/songs/level", Some("cover.png"));
/// assert_eq!(source.path().as_deref(), Some(Path::new("/songs/level/cover.png")));
///
/// assert!(SourceDescriptor::new("/songs/level", Some("")).path().is_none());
/// assert!(SourceDescriptor::new("/songs/level", None::<&str>).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    base_dir: PathBuf,
    file_name: Option<String>,
}

impl SourceDescriptor {
    /// Creates a descriptor for `file_name` inside `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, file_name: Option<impl Into<String>>) -> Self {
        SourceDescriptor {
            base_dir: base_dir.into(),
            file_name: file_name.map(Into::into),
        }
    }

    /// Creates a descriptor from an already resolved path.
    ///
    /// Returns `None` if the file name is not valid UTF-8. A path without a
    /// file name gives a descriptor with no cover file.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let file_name = match path.file_name() {
            Some(name) => Some(name.to_str()?.to_owned()),
            None => None,
        };
        Some(SourceDescriptor {
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_name,
        })
    }

    /// Directory the cover file name is relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The cover file name, if the level declares a non-empty one.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Returns `true` if there is nothing to load.
    pub fn is_empty(&self) -> bool {
        self.file_name().is_none()
    }

    /// Full path of the cover, or `None` when the file name is absent or empty.
    pub fn path(&self) -> Option<PathBuf> {
        self.file_name().map(|name| self.base_dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone)]
    struct Handle(Arc<u32>);

    impl Asset for Handle {
        type Texture = u32;

        fn texture(&self) -> Option<u32> {
            Some(*self.0)
        }

        fn same_resource(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.0, &other.0)
        }
    }

    #[test]
    fn test_closure_liveness() {
        let check = |h: &Handle| *h.0 != 0;
        assert!(check.is_live(&Handle(Arc::new(1))));
        assert!(!check.is_live(&Handle(Arc::new(0))));
        assert!(LivenessCheck::<Handle>::is_live(&AlwaysLive, &Handle(Arc::new(0))));
    }

    #[test]
    fn test_same_resource_follows_identity() {
        let a = Handle(Arc::new(7));
        let b = a.clone();
        let c = Handle(Arc::new(7));
        assert!(a.same_resource(&b));
        assert!(!a.same_resource(&c));
        assert_eq!(a.texture(), Some(7));
    }

    #[test]
    fn test_descriptor_whitespace_name_is_kept() {
        let source = SourceDescriptor::new("dir", Some(" "));
        assert!(!source.is_empty());
        assert_eq!(source.path(), Some(PathBuf::from("dir").join(" ")));
    }

    #[test]
    fn test_descriptor_from_path() {
        let source = SourceDescriptor::from_path("/a/b/cover.jpg").unwrap();
        assert_eq!(source.base_dir(), Path::new("/a/b"));
        assert_eq!(source.file_name(), Some("cover.jpg"));

        let root = SourceDescriptor::from_path("/").unwrap();
        assert!(root.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_descriptor_from_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/a/b").join(OsStr::from_bytes(b"cover-\xff.png"));
        assert!(SourceDescriptor::from_path(path).is_none());
    }
}
