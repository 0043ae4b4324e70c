use crate::decode::{decode_line, split_lines};
use crate::error::Result;
use crate::event::{MatchEvent, ScanEvent};
use crate::matcher::Matcher;
use crate::request::ScanRequest;
use crate::settings::ScanSettings;
use async_stream::stream;
use futures::{Stream, StreamExt};
use logsift_storage::BackendHandle;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

type EventStream = Pin<Box<dyn Stream<Item = ScanEvent> + Send + 'static>>;

/// Prefix used by [`StreamingScanner::start_scan`] when the caller gives none.
pub const DEFAULT_PATH_PREFIX: &str = "default";

/// Cancellation flag for one running scan.
///
/// Cheap to clone and safe to [`close()`](Self::close) from any thread while
/// the scan is running; the scan polls it between pages, objects and lines.
#[derive(Clone, Debug, Default)]
pub struct ScanHandle {
    closed: Arc<AtomicBool>,
}
impl ScanHandle {
    /// Stop the scan. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Everything that changes while one scan runs. Owned by the scan's stream
/// and dropped with it.
struct ScanState {
    matches_found: u64,
    files_processed: u64,
    last_emit: Instant,
    /// `None` until the first progress event, so the first processed object
    /// always reports.
    last_progress: Option<Instant>,
}
impl ScanState {
    fn new(now: Instant) -> Self {
        Self { matches_found: 0, files_processed: 0, last_emit: now, last_progress: None }
    }

    fn emitted(&mut self) {
        self.last_emit = Instant::now();
    }

    fn keepalive_due(&mut self, settings: &ScanSettings) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_emit) > settings.keepalive_interval {
            self.last_emit = now;
            return true;
        }
        false
    }

    fn progress_due(&mut self, settings: &ScanSettings) -> bool {
        let now = Instant::now();
        let batch = settings.progress_every.max(1);
        let interval_elapsed = self
            .last_progress
            .is_none_or(|last| now.duration_since(last) > settings.progress_interval);
        if self.files_processed % batch == 0 || interval_elapsed {
            self.last_progress = Some(now);
            self.last_emit = now;
            return true;
        }
        false
    }
}

/// Streaming line search over a storage backend.
///
/// One scanner can start any number of concurrent scans; each gets its own
/// state and cancellation flag and shares nothing but the backend handle.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use logsift_search::{ScanEvent, ScanSettings, StreamingScanner};
/// use logsift_storage::backend::LocalBackend;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::tempdir()?;
/// # std::fs::create_dir_all(dir.path().join("Partner"))?;
/// # std::fs::write(dir.path().join("Partner/a.txt"), "pin 4521 paid\n")?;
/// let backend = Arc::new(LocalBackend::new("local", dir.path())?);
/// let scanner = StreamingScanner::new(backend, ScanSettings::default());
/// let scan = scanner.start_scan(Some("4521"), None, Some("Partner"))?;
/// let events: Vec<ScanEvent> = scan.collect().await;
/// assert!(events.iter().any(|e| matches!(e, ScanEvent::Complete { count: 1, .. })));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StreamingScanner {
    backend: BackendHandle,
    settings: ScanSettings,
    default_prefix: String,
}

impl StreamingScanner {
    pub fn new(backend: BackendHandle, settings: ScanSettings) -> Self {
        Self {
            backend,
            settings,
            default_prefix: DEFAULT_PATH_PREFIX.to_string(),
        }
    }

    /// Change the prefix used when a scan is started without one.
    pub fn with_default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Validate raw client parameters and start a scan.
    ///
    /// A missing term is rejected here, before the backend is touched.
    /// Nothing is requested from storage until the returned scan is polled.
    pub fn start_scan(
        &self,
        term: Option<&str>,
        date_filter: Option<&str>,
        path_prefix: Option<&str>,
    ) -> Result<ActiveScan> {
        let request = ScanRequest::new(term, date_filter, path_prefix.unwrap_or(&self.default_prefix))?;
        Ok(self.scan(request))
    }

    /// Start a scan for an already validated request.
    pub fn scan(&self, request: ScanRequest) -> ActiveScan {
        let handle = ScanHandle::default();
        let events = run(self.backend.clone(), self.settings.clone(), request, handle.clone());
        ActiveScan { handle, events: Box::pin(events) }
    }
}

/// A started scan: its event stream plus the handle that cancels it.
///
/// Dropping the stream also ends the scan, since nothing drives it anymore.
pub struct ActiveScan {
    handle: ScanHandle,
    events: EventStream,
}

impl ActiveScan {
    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    /// Drive the scan on its own task, delivering events through a bounded
    /// channel of `buffer` slots.
    ///
    /// A slow consumer only back-pressures its own scan. When the receiver
    /// is dropped the client is gone, so the scan is closed.
    pub fn spawn(self, buffer: usize) -> (ScanHandle, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let ActiveScan { handle, mut events } = self;
        let producer = handle.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if tx.send(event).await.is_err() {
                    tracing::debug!("Event receiver dropped; closing scan");
                    producer.close();
                    break;
                }
            }
        });
        (handle, rx)
    }
}

impl Stream for ActiveScan {
    type Item = ScanEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

fn run(
    backend: BackendHandle,
    settings: ScanSettings,
    request: ScanRequest,
    handle: ScanHandle,
) -> impl Stream<Item = ScanEvent> + Send + 'static {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        if handle.is_closed() {
            return;
        }
        let matcher = Matcher::new(request.term(), settings.match_mode);
        let prefix = request.effective_prefix();
        let mut state = ScanState::new(Instant::now());
        tracing::info!(backend = backend.name(), prefix = %prefix, mode = %matcher.mode(), "Starting scan");

        yield ScanEvent::Handshake;
        yield ScanEvent::RetryHint { millis: u64::try_from(settings.retry_hint.as_millis()).unwrap_or(u64::MAX) };
        state.emitted();

        let mut pages = backend.list_pages(&prefix, settings.page_size);
        let mut failure = None;
        let mut line = Vec::new();
        'pages: loop {
            if handle.is_closed() {
                return;
            }
            let page = match pages.next().await {
                Some(Ok(page)) => page,
                Some(Err(err)) => {
                    failure = Some(err);
                    break 'pages;
                },
                None => break 'pages,
            };
            for object in page {
                if handle.is_closed() {
                    return;
                }
                if state.keepalive_due(&settings) {
                    yield ScanEvent::Keepalive;
                    if handle.is_closed() {
                        return;
                    }
                }
                if !object.has_suffix(&settings.suffix) {
                    continue;
                }
                tracing::debug!(key = %object.key, "Processing object");
                let mut reader = match backend.reader(&object.key).await {
                    Ok(reader) => reader,
                    Err(err) => {
                        tracing::warn!(
                            key = %object.key,
                            retryable = err.is_retryable(),
                            error = ?err,
                            "Skipping object that could not be fetched"
                        );
                        continue;
                    },
                };

                let mut lines_read = 0u64;
                let outcome = loop {
                    if handle.is_closed() {
                        return;
                    }
                    line.clear();
                    match reader.read_until(b'\n', &mut line).await {
                        Ok(0) => break Ok(()),
                        Ok(_) => lines_read += 1,
                        Err(err) => break Err(err),
                    }
                    // The body read may have been parked long enough for the
                    // consumer to close.
                    if handle.is_closed() {
                        return;
                    }
                    if state.keepalive_due(&settings) {
                        yield ScanEvent::Keepalive;
                    }
                    for segment in split_lines(&line) {
                        let Some(decoded) = decode_line(segment, settings.fallback) else {
                            tracing::trace!(key = %object.key, line = lines_read, "Skipping undecodable line");
                            continue;
                        };
                        if !matcher.is_match(&decoded) {
                            continue;
                        }
                        if handle.is_closed() {
                            return;
                        }
                        state.matches_found += 1;
                        tracing::debug!(key = %object.key, line = lines_read, "Found match");
                        let event = MatchEvent { key: object.key.clone(), line: decoded.into_owned() };
                        yield ScanEvent::Match(event);
                        state.emitted();
                    }
                };
                if let Err(err) = outcome {
                    if lines_read == 0 {
                        tracing::warn!(key = %object.key, error = %err, "Skipping object that failed before any read");
                        continue;
                    }
                    tracing::warn!(
                        key = %object.key,
                        lines = lines_read,
                        error = %err,
                        "Object read interrupted; keeping lines already scanned"
                    );
                }

                state.files_processed += 1;
                if state.progress_due(&settings) && !handle.is_closed() {
                    tracing::debug!(files = state.files_processed, matches = state.matches_found, "Progress");
                    yield ScanEvent::Progress {
                        files_processed: state.files_processed,
                        matches_found: state.matches_found,
                    };
                }
            }
        }

        if handle.is_closed() {
            return;
        }
        match failure {
            None => {
                tracing::info!(files = state.files_processed, matches = state.matches_found, "Scan complete");
                yield ScanEvent::Complete { count: state.matches_found, files_processed: state.files_processed };
            },
            Some(err) => {
                tracing::error!(prefix = %prefix, error = ?err, "Listing failed; aborting scan");
                yield ScanEvent::Error { message: (*err).to_string() };
            },
        }
        if !handle.is_closed() {
            yield ScanEvent::Close;
        }
    })
}
