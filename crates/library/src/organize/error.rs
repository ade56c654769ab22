//! Error types for the [`organize`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organize failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Conflict`]
/// - [`ErrorKind::InvalidName`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A storage backend operation (list, exists, rename) failed.
    Storage,
    /// No free name was found within the probe limit.
    Conflict,
    /// The file's name can't be used to build a destination (no final path
    /// component, or not UTF-8).
    InvalidName,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
