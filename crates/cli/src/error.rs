//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Which step of a command failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open vault at {}", _0.display())]
    Vault(#[error(not(source))] PathBuf),
    #[display("could not read or write vault settings")]
    Settings,
    #[display("could not organize images")]
    Organize,
    #[display("not a file name: {_0}")]
    InvalidName(#[error(not(source))] String),
}
