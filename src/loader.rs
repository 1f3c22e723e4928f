//! Cover Loader
//!
//! The cache does not know how to turn a file into a texture. It asks a
//! [`Loader`] and caches whatever comes back.

use crate::asset::SourceDescriptor;
use crate::error::LoadError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Loads a cover image into a renderable asset.
///
/// The cache guarantees at most one outstanding call per key, but calls for
/// different keys run concurrently. Implementations should check `cancel`
/// between expensive steps and return [`LoadError::Cancelled`] once it fires.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use cover_cache::{LoadError, Loader, SourceDescriptor};
/// use tokio_util::sync::CancellationToken;
///
/// struct FileSizeLoader;
///
/// #[async_trait]
/// impl Loader<u64> for FileSizeLoader {
///     async fn load_asset(
///         &self,
///         source: &SourceDescriptor,
///         cancel: CancellationToken,
///     ) -> Result<u64, LoadError> {
///         let path = source.path().ok_or(LoadError::NotFound)?;
///         if cancel.is_cancelled() {
///             return Err(LoadError::Cancelled);
///         }
///         match std::fs::metadata(path) {
///             Ok(meta) => Ok(meta.len()),
///             Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LoadError::NotFound),
///             Err(e) => Err(e.into()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Loader<A>: Send + Sync + 'static {
    /// Loads the cover described by `source`.
    async fn load_asset(
        &self,
        source: &SourceDescriptor,
        cancel: CancellationToken,
    ) -> Result<A, LoadError>;
}
