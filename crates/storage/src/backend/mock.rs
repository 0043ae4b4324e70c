//! In-memory storage backend for testing.

use super::{BoxAsyncBufRead, ObjectPageStream};
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::future::Future;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tokio::sync::Mutex;
use tokio::time::Sleep;

enum Body {
    Ok(Vec<u8>),
    /// Opening the object fails outright.
    FailOpen,
    /// The body yields these bytes, then a read error.
    FailAfter(Vec<u8>),
    /// Opening succeeds at once but the first body read stalls.
    Stalled(Vec<u8>, Duration),
}

/// Reader that always fails, chained after a body to simulate a dropped
/// connection mid-download.
struct Severed;
impl AsyncRead for Severed {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer")))
    }
}

/// Body whose reads wait for `sleep` before returning data.
struct Stalled {
    sleep: Pin<Box<Sleep>>,
    inner: Cursor<Vec<u8>>,
}
impl AsyncRead for Stalled {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        ready!(self.sleep.as_mut().poll(cx));
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// In-memory storage backend for testing.
///
/// Objects are fixed at construction time and listed in key order. Beyond
/// plain content it can simulate the failures a remote store produces
/// (objects that can't be opened, bodies that break mid-stream, listings
/// that fail after some pages, slow fetches) and records every fetch so
/// tests can assert which objects were actually read.
///
/// # Examples
///
/// ```
/// use logsift_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("logs/a.txt", "hello\n"),
///     ("logs/b.bin", "ignored"),
/// ])
/// .with_failing_object("logs/c.txt");
/// assert_eq!(backend.list("logs/").await?.len(), 3);
/// assert!(backend.reader("logs/c.txt").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    objects: BTreeMap<String, Body>,
    list_failure_after: Option<usize>,
    read_delay: Option<Duration>,
    fetched: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let objects = objects.into_iter().map(|(key, data)| (key.into(), Body::Ok(data.into()))).collect();
        Self {
            name: "mock".to_string(),
            objects,
            list_failure_after: None,
            read_delay: None,
            fetched: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Add an object that is listed but can never be opened.
    pub fn with_failing_object(mut self, key: impl Into<String>) -> Self {
        self.objects.insert(key.into(), Body::FailOpen);
        self
    }

    /// Add an object whose body delivers `data` and then errors.
    pub fn with_severed_object(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.into(), Body::FailAfter(data.into()));
        self
    }

    /// Add an object that opens immediately but whose body takes `stall` to
    /// deliver its first bytes.
    pub fn with_stalled_object(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>, stall: Duration) -> Self {
        self.objects.insert(key.into(), Body::Stalled(data.into(), stall));
        self
    }

    /// Make listing fail after `pages` pages have been yielded.
    pub fn with_list_failure_after(mut self, pages: usize) -> Self {
        self.list_failure_after = Some(pages);
        self
    }

    /// Delay every [`reader()`](StorageBackend::reader) call.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Keys passed to [`reader()`](StorageBackend::reader), in call order.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }

    /// Number of times a listing was started.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn size(body: &Body) -> u64 {
        match body {
            Body::Ok(data) | Body::FailAfter(data) | Body::Stalled(data, _) => data.len() as u64,
            Body::FailOpen => 0,
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, &str); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_pages<'a>(&'a self, prefix: &'a str, page_size: usize) -> ObjectPageStream<'a> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let page_size = page_size.max(1);
        Box::pin(stream! {
            let matching: Vec<ObjectInfo> = self
                .objects
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, body)| ObjectInfo::new(key.clone(), Self::size(body), None))
                .collect();
            for (index, page) in matching.chunks(page_size).enumerate() {
                if self.list_failure_after.is_some_and(|limit| index >= limit) {
                    break;
                }
                yield Ok(page.to_vec());
            }
            if self.list_failure_after.is_some() {
                yield Err(exn::Exn::from(ErrorKind::Network("listing interrupted".to_string())));
            }
        })
    }

    async fn reader(&self, key: &str) -> Result<BoxAsyncBufRead> {
        self.fetched.lock().await.push(key.to_string());
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        match self.objects.get(key) {
            Some(Body::Ok(data)) => Ok(Box::pin(Cursor::new(data.clone()))),
            Some(Body::FailAfter(data)) => Ok(Box::pin(BufReader::new(Cursor::new(data.clone()).chain(Severed)))),
            Some(Body::Stalled(data, stall)) => {
                let body = Stalled { sleep: Box::pin(tokio::time::sleep(*stall)), inner: Cursor::new(data.clone()) };
                Ok(Box::pin(BufReader::new(body)))
            },
            Some(Body::FailOpen) => exn::bail!(ErrorKind::Network(format!("failed to open {key}"))),
            None => exn::bail!(ErrorKind::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tokio::io::AsyncReadExt;

    async fn read_all(backend: &MockBackend, key: &str) -> std::io::Result<Vec<u8>> {
        let mut reader = backend.reader(key).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map(|_| buf)
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_objects([("a/1.txt", "1"), ("a/2.txt", "22"), ("b/3.txt", "3")]);
        let files = backend.list("a/").await.unwrap();
        let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["a/1.txt", "a/2.txt"]);
        assert_eq!(files[1].size, 2);
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_pages() {
        let backend = MockBackend::with_objects((0..5).map(|i| (format!("k/{i}"), "x")));
        let pages: Vec<Vec<ObjectInfo>> = backend.list_pages("k/", 2).try_collect().await.unwrap();
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), [2, 2, 1]);
    }

    #[tokio::test]
    async fn test_list_failure_after_pages() {
        let backend = MockBackend::with_objects((0..5).map(|i| (format!("k/{i}"), "x"))).with_list_failure_after(1);
        let mut pages = backend.list_pages("k/", 2);
        assert_eq!(pages.try_next().await.unwrap().unwrap().len(), 2);
        let err = pages.try_next().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
    }

    #[tokio::test]
    async fn test_reader_records_fetches() {
        let backend = MockBackend::with_objects([("a.txt", "hello")]);
        assert_eq!(read_all(&backend, "a.txt").await.unwrap(), b"hello");
        assert_eq!(backend.fetched().await, ["a.txt"]);
    }

    #[tokio::test]
    async fn test_failing_and_missing_objects() {
        let backend = MockBackend::default().with_failing_object("bad.txt");
        assert!(backend.reader("bad.txt").await.is_err());
        let err = backend.reader("missing.txt").await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_object() {
        let backend = MockBackend::default().with_stalled_object("slow.txt", "late\n", Duration::from_secs(20));
        let start = tokio::time::Instant::now();
        assert_eq!(read_all(&backend, "slow.txt").await.unwrap(), b"late\n");
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_severed_object() {
        let backend = MockBackend::default().with_severed_object("cut.txt", "partial\n");
        let err = read_all(&backend, "cut.txt").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }
}
