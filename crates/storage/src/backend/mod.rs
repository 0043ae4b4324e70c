//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a read-only interface over
//! a collection of objects that can be listed page by page under a prefix and
//! streamed line by line (local filesystem, S3-compatible services, etc.).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::ObjectInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;
use tokio::io::AsyncBufRead;

/// Page size used by [`StorageBackend::list`]. Matches the S3 maximum.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub type ObjectPageStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<ObjectInfo>>> + Send + 'a>>;
pub type BoxAsyncBufRead = Pin<Box<dyn AsyncBufRead + Send + 'static>>;

/// Unified interface for storage backends.
///
/// Backends are shared between any number of concurrent scans behind a
/// [`BackendHandle`](crate::BackendHandle), so every method works on `&self`
/// and must not mutate per-request state.
///
/// # Prefixes
/// Prefixes follow S3 semantics: they are plain string prefixes of the key,
/// not path components. `logs/2024` matches `logs/2024-01.txt`, whereas
/// `logs/2024/` only matches keys inside the `2024` "directory".
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// use tokio::io::AsyncBufReadExt;
/// use logsift_storage::{backend::StorageBackend, error::Result};
///
/// async fn count_lines(backend: &dyn StorageBackend) -> Result<usize> {
///     let mut lines = 0;
///     let mut pages = backend.list_pages("logs/", 100);
///     while let Some(page) = pages.try_next().await? {
///         for object in page {
///             let mut reader = backend.reader(&object.key).await?;
///             let mut buf = Vec::new();
///             while reader.read_until(b'\n', &mut buf).await.map_err(logsift_storage::error::ErrorKind::Io)? > 0 {
///                 lines += 1;
///                 buf.clear();
///             }
///         }
///     }
///     Ok(lines)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List all objects under a prefix.
    ///
    /// Default implementation collects every page from
    /// [`list_pages()`](Self::list_pages) into a single [`Vec`]. Prefer
    /// `list_pages()` for large collections.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.list_pages(prefix, DEFAULT_PAGE_SIZE).try_concat().await
    }

    /// Stream object metadata under a prefix, one page at a time.
    ///
    /// Each item holds at most `page_size` entries (a `page_size` of zero is
    /// treated as one). Pages are only requested from the underlying
    /// service as the stream is polled, so dropping the stream stops the
    /// enumeration. An `Err` item means the enumeration itself failed;
    /// callers should treat it as terminal.
    fn list_pages<'a>(&'a self, prefix: &'a str, page_size: usize) -> ObjectPageStream<'a>;

    /// Open an object for streaming, buffered reads.
    ///
    /// The connection/file is opened before returning; the body is pulled
    /// lazily as the reader is consumed. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if the object does not
    /// exist.
    async fn reader(&self, key: &str) -> Result<BoxAsyncBufRead>;
}
