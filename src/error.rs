//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not set up from configuration")]
    Setup,
    #[display("invalid search request")]
    Request,
    #[display("scan ended with an error")]
    ScanFailed,
}
