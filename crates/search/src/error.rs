//! Search Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only problems with the request itself are errors here. Once a scan is
//! running, failures are reported in-band as
//! [`ScanEvent::Error`](crate::ScanEvent::Error) or skipped and logged.

use derive_more::{Display, Error};

/// A search error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client input errors. The scan never starts when one of these is raised.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No search term, or a blank one.
    #[display("search term is required")]
    MissingTerm,
    /// The path prefix or date filter doesn't form a usable key prefix.
    #[display("invalid path prefix: {_0}")]
    InvalidPrefix(#[error(not(source))] String),
    /// A textual setting (match mode, fallback encoding) was not recognised.
    #[display("unknown {setting}: {value}")]
    UnknownSetting {
        /// Which setting was being parsed.
        setting: &'static str,
        /// The rejected value.
        value: String,
    },
}
