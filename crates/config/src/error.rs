//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source could not be read or did not deserialize
    #[display("could not load configuration")]
    Load,
    /// Values deserialized but make no sense together
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The configured storage backend could not be constructed
    #[display("could not set up storage backend")]
    Storage,
}
