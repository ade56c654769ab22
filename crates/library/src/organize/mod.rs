//! Moving images into the destination folder.
//!
//! A file is moved by [`organize_file`]: unless the destination is unset or
//! the file is already there, the destination folder is created (if needed),
//! a free name is found by [`unique_path`], and the backend renames the file.
//!
//! When the desired name is taken, the resolver probes `name-1.ext`,
//! `name-2.ext`, … in order and takes the first free one. The check and the
//! rename are two separate backend calls, so two movers racing for the same
//! name can both see it free; the backend's rename decides who wins.
//!
//! The bulk entry point is [`organize`], which streams an [`OrganizeEvent`]
//! per image found in the vault; [`sweep`] drains that stream into a
//! [`Summary`].

mod conflict;
pub mod error;
mod file;
mod stream;

pub use self::conflict::{split_name, unique_path};
pub use self::file::{Action, organize_file};
pub use self::stream::{OrganizeEvent, Summary, organize, sweep};
