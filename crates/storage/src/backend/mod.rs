//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the seam between the
//! organizer and whatever holds the vault: the local filesystem in
//! production, an in-memory map in tests, or a read-only wrapper for dry runs.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for vault storage.
///
/// All operations are asynchronous and take `&self`, so a backend can be
/// shared behind a [`BackendHandle`](crate::BackendHandle) between the
/// startup sweep and the creation watcher.
///
/// # Path Handling
/// All paths are relative to the vault root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use imgshelf_storage::{backend::StorageBackend, error::Result};
///
/// async fn count_images(backend: &dyn StorageBackend) -> Result<usize> {
///     let files = backend.list().await?;
///     Ok(files.iter().filter(|f| f.name().is_some_and(|n| n.ends_with(".png"))).count())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List every visible file in the vault.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream file metadata for the whole vault.
    ///
    /// Yields files (never folders) incrementally. Anything under a
    /// dot-prefixed folder, and dot-prefixed files themselves, are left out.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use imgshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream();
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self) -> FileInfoStream<'_>;

    /// Check if an entry (file or folder) exists at `path`.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Write file contents, creating parent folders as needed.
    ///
    /// Creates a new file or overwrites an existing one. A newly written file
    /// counts as created for the purposes of [`watch()`](Self::watch).
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Create a folder (and any missing ancestors).
    ///
    /// Returns [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) if an
    /// entry already occupies `path`. Callers that only care about the folder
    /// being there afterwards should treat that as success.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::ops::Deref;
    /// use std::path::Path;
    /// use imgshelf_storage::error::ErrorKind;
    /// # use imgshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// match backend.create_dir(Path::new("_images")).await {
    ///     Ok(()) => println!("created"),
    ///     Err(e) if matches!(e.deref(), ErrorKind::AlreadyExists(_)) => println!("already there"),
    ///     Err(e) => return Err(e),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn create_dir(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed
    /// - If the destination already exists, it will be overwritten. Callers
    ///   that must not clobber anything probe for a free name first.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Subscribe to files created in the vault.
    ///
    /// A file counts as created when it is written fresh or when it arrives
    /// under its final name by a rename, from inside the vault or from
    /// outside it. Hidden paths are never reported.
    ///
    /// The subscription is registered when this method is called, not when
    /// the stream is first polled, so nothing created in between is missed.
    /// The stream runs until the backend goes away; individual failures are
    /// yielded as `Err` items without ending it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::StreamExt;
    /// # use imgshelf_storage::backend::StorageBackend;
    /// # async fn example(backend: &dyn StorageBackend) {
    /// let mut created = backend.watch();
    /// while let Some(Ok(file)) = created.next().await {
    ///     println!("new file: {}", file.path.display());
    /// }
    /// # }
    /// ```
    fn watch(&self) -> FileInfoStream<'_>;
}
