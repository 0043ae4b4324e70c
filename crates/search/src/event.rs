//! Scan events and their push-channel framing.
//!
//! Every [`ScanEvent`] renders (via [`Display`]) as one complete
//! server-sent-events frame, terminated by a blank line:
//!
//! | Event                              | Frame                                                          |
//! |------------------------------------|----------------------------------------------------------------|
//! | `Handshake`, `Keepalive`           | `: keepalive`                                                  |
//! | `RetryHint`                        | `retry: 30000`                                                 |
//! | `Match`                            | `data: {"result":"[<key>] <line>"}`                            |
//! | `Progress`                         | `data: {"status":"progress","files_processed":N,"matches_found":N}` |
//! | `Complete`                         | `data: {"status":"complete","count":N,"files_processed":N}`   |
//! | `Error`                            | `data: {"error":"<message>"}`                                  |
//! | `Close`                            | `event: close` + `data: {}`                                    |

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// One matching line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchEvent {
    /// Key of the object the line came from.
    pub key: String,
    /// The full decoded line, without its line terminator.
    pub line: String,
}
impl MatchEvent {
    /// The client-facing `[<key>] <line>` rendering.
    pub fn result(&self) -> String {
        format!("[{}] {}", self.key, self.line)
    }
}

/// Events produced by a [`StreamingScanner`](crate::StreamingScanner).
///
/// Events follow a strict ordering:
/// 1. [`Handshake`](Self::Handshake) then [`RetryHint`](Self::RetryHint),
///    exactly once each, before any storage access.
/// 2. Any number of [`Keepalive`](Self::Keepalive), [`Match`](Self::Match)
///    and [`Progress`](Self::Progress) events.
/// 3. Either [`Complete`](Self::Complete) or [`Error`](Self::Error), then
///    [`Close`](Self::Close).
///
/// A cancelled scan stops wherever it is and never emits step 3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Handshake,
    RetryHint { millis: u64 },
    Keepalive,
    Match(MatchEvent),
    Progress { files_processed: u64, matches_found: u64 },
    Complete { count: u64, files_processed: u64 },
    Error { message: String },
    Close,
}

#[derive(Serialize)]
struct ResultPayload {
    result: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StatusPayload {
    Progress { files_processed: u64, matches_found: u64 },
    Complete { count: u64, files_processed: u64 },
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

fn write_data(f: &mut Formatter<'_>, payload: &impl Serialize) -> FmtResult {
    let json = serde_json::to_string(payload).map_err(|_| std::fmt::Error)?;
    write!(f, "data: {json}\n\n")
}

impl Display for ScanEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ScanEvent::Handshake | ScanEvent::Keepalive => f.write_str(": keepalive\n\n"),
            ScanEvent::RetryHint { millis } => write!(f, "retry: {millis}\n\n"),
            ScanEvent::Match(m) => write_data(f, &ResultPayload { result: m.result() }),
            ScanEvent::Progress { files_processed, matches_found } => write_data(
                f,
                &StatusPayload::Progress {
                    files_processed: *files_processed,
                    matches_found: *matches_found,
                },
            ),
            ScanEvent::Complete { count, files_processed } => write_data(
                f,
                &StatusPayload::Complete {
                    count: *count,
                    files_processed: *files_processed,
                },
            ),
            ScanEvent::Error { message } => write_data(f, &ErrorPayload { error: message }),
            ScanEvent::Close => f.write_str("event: close\ndata: {}\n\n"),
        }
    }
}

impl ScanEvent {
    /// Render as a complete wire frame.
    pub fn to_frame(&self) -> String {
        self.to_string()
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEvent::Close)
    }
}
