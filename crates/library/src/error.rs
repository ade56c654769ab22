//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which public operation failed. The error tree underneath says why.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The destination folder from the settings isn't a usable vault path.
    #[display("invalid destination folder: {_0}")]
    Config(#[error(not(source))] String),
    /// Moving a single file failed.
    #[display("could not move file into the destination folder")]
    Organize,
    /// A sweep over the whole vault failed.
    #[display("sweep failed")]
    Sweep,
    /// The startup gate could not read or record its state.
    #[display("startup failed")]
    Startup,
    /// The creation watcher reported a failure.
    #[display("watch failed")]
    Watch,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Watch)
    }
}
