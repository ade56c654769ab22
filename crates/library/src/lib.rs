//! Keeps a vault's images in a single folder.
//!
//! - [`organize::organize_file`] moves one file into the destination folder,
//!   probing `name-1.ext`, `name-2.ext`, … when the name is taken.
//! - [`organize::organize`] (and the [`organize::sweep`] shorthand) does that
//!   for every image already in the vault.
//! - [`startup()`] decides whether a sweep happens when the program starts.
//! - [`watch()`] moves images as the vault reports them created.
//! - [`session()`] runs the two together, watching from before the startup
//!   question is asked.
//!
//! Everything runs against a [`BackendHandle`](imgshelf_storage::BackendHandle)
//! and a [`Context`] built from the vault's [`Settings`].

pub mod error;
mod filter;
pub mod host;
pub mod organize;
mod session;
mod startup;
mod watch;

pub use crate::filter::{IMAGE_EXTENSIONS, is_image};
pub use crate::session::{SessionEvent, session};
pub use crate::startup::{Startup, startup};
pub use crate::watch::watch;
use crate::error::{ErrorKind, Result};
use crate::host::NotifierHandle;
use exn::ResultExt;
use imgshelf_config::{FailurePolicy, Settings};
use imgshelf_storage::validate_path;
use std::path::{Path, PathBuf};

/// Everything an organize operation needs besides the backend.
pub struct Context {
    /// Validated destination folder. `None` when the settings leave it empty,
    /// which turns every move into a no-op.
    folder: Option<PathBuf>,
    pub policy: FailurePolicy,
    pub notifier: NotifierHandle,
}
impl Context {
    /// Builds a context from the vault's settings.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] if the folder name is not a valid vault-relative
    /// path (e.g. it climbs out with `..`).
    pub fn new(settings: &Settings, notifier: NotifierHandle) -> Result<Self> {
        let name = &settings.folder_name;
        // A blank name means "not configured". Anything else is used as
        // written, surrounding spaces included.
        let folder = match name.trim().is_empty() {
            true => None,
            false => Some(validate_path(name).or_raise(|| ErrorKind::Config(name.clone()))?),
        };
        Ok(Self {
            folder,
            policy: FailurePolicy::default(),
            notifier,
        })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }
}
