//! Configuration for imgshelf.
//!
//! Two separate records live here:
//!
//! - [`Config`]: how the program runs (which vault, what to do at startup,
//!   how a sweep reacts to failures). Layered with [`figment`] from defaults,
//!   config files, `IMGSHELF_*` environment variables and command-line
//!   overrides. Never written back.
//! - [`Settings`]: the small record persisted per vault (destination folder
//!   and whether the one-time sweep already happened). Loaded through a
//!   [`SettingsStore`], merged over defaults, and saved back whenever it
//!   changes.

mod config;
pub mod error;
mod settings;
mod store;

pub use crate::config::{Config, FailurePolicy, StartupMode};
pub use crate::settings::{DEFAULT_FOLDER, Settings};
pub use crate::store::{JsonFileStore, MemoryStore, SettingsStore};
