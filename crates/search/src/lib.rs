//! Cancelable streaming line search over object storage.
//!
//! A [`StreamingScanner`] pages through every object under a prefix, reads
//! the text objects line by line, and emits [`ScanEvent`]s: matches as they
//! are found, periodic progress, keepalives while the storage is slow, and a
//! final completion or error. Events render as server-sent-event frames, so
//! a transport only has to write them out.
//!
//! ```no_run
//! use futures::StreamExt;
//! use logsift_search::{ScanSettings, StreamingScanner};
//! # async fn example(backend: logsift_storage::BackendHandle) -> logsift_search::error::Result<()> {
//! let scanner = StreamingScanner::new(backend, ScanSettings::default());
//! let mut scan = scanner.start_scan(Some("4521"), Some("2024-05-01"), None)?;
//! let handle = scan.handle();
//! while let Some(event) = scan.next().await {
//!     print!("{event}");
//!     # handle.close();
//! }
//! # Ok(())
//! # }
//! ```

mod decode;
pub mod error;
mod event;
mod matcher;
mod request;
mod scanner;
mod settings;

pub use crate::decode::{decode_line, split_lines};
pub use crate::event::{MatchEvent, ScanEvent};
pub use crate::matcher::Matcher;
pub use crate::request::ScanRequest;
pub use crate::scanner::{ActiveScan, DEFAULT_PATH_PREFIX, ScanHandle, StreamingScanner};
pub use crate::settings::{Fallback, MatchMode, ScanSettings};
