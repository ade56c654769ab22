use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::conflict::unique_path_inner;
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use exn::{OptionExt, ResultExt};
use imgshelf_storage::BackendHandle;
use imgshelf_storage::error::ErrorKind as StorageErrorKind;
use imgshelf_storage::file::FileInfo;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The outcome of (successfully) organizing a single file.
///
/// Each variant carries the relevant path: the new location for a move, the
/// untouched current location otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// File was moved into the destination folder.
    Moved(PathBuf),
    /// File was already directly inside the destination folder.
    AlreadyCorrect(PathBuf),
    /// No destination folder is configured, so nothing was done.
    Unconfigured(PathBuf),
    /// File was gone by the time it was renamed, usually because a watcher
    /// and a sweep both picked it up and the other one moved it first.
    Vanished(PathBuf),
}
impl Action {
    pub fn path(&self) -> &Path {
        match self {
            Self::Moved(p) | Self::AlreadyCorrect(p) | Self::Unconfigured(p) | Self::Vanished(p) => p,
        }
    }
}

/// Moves a single file into the destination folder from the [`Context`].
///
/// - **[`Action::Unconfigured`]**: the folder name is empty.
/// - **[`Action::AlreadyCorrect`]**: the file's parent is the destination
///   folder already. Files in sub-folders of the destination are not
///   "already correct" and get moved up.
/// - **[`Action::Moved`]**: the folder was created if missing, a free name
///   was picked by [`unique_path`](crate::organize::unique_path), and the
///   file renamed there. One `Image moved to <path>` notice is sent.
/// - **[`Action::Vanished`]**: the rename found no source file. No notice.
///
/// Failing to create the folder is not fatal by itself; if the folder really
/// is missing, the rename that follows fails instead.
///
/// Whether the file is an image is the caller's business.
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Organize>`](LibraryErrorKind::Organize)
/// raised from an inner [`Exn<OrganizeErrorKind>`](OrganizeErrorKind).
pub async fn organize_file(backend: &BackendHandle, ctx: &Context, file: &FileInfo) -> LibraryResult<Action> {
    organize_file_inner(backend, ctx, file).await.or_raise(|| LibraryErrorKind::Organize)
}

#[instrument(skip_all, fields(path = %file.path.display()))]
pub(crate) async fn organize_file_inner(
    backend: &BackendHandle,
    ctx: &Context,
    file: &FileInfo,
) -> OrganizeResult<Action> {
    let Some(folder) = ctx.folder() else {
        tracing::debug!("No destination folder configured");
        return Ok(Action::Unconfigured(file.path.clone()));
    };
    if file.parent() == folder {
        return Ok(Action::AlreadyCorrect(file.path.clone()));
    }

    match backend.create_dir(folder).await {
        Ok(()) => tracing::info!(folder = %folder.display(), "Created destination folder"),
        Err(e) if matches!(e.deref(), StorageErrorKind::AlreadyExists(_)) => (),
        // Leave it to the rename to fail if the folder really is missing.
        Err(e) => tracing::warn!(folder = %folder.display(), "Could not create destination folder: {e:?}"),
    }

    let name = file.name().ok_or_raise(|| OrganizeErrorKind::InvalidName)?;
    let destination = unique_path_inner(backend, folder, name).await?;
    match backend.rename(&file.path, &destination).await {
        Ok(()) => (),
        Err(e) if matches!(e.deref(), StorageErrorKind::NotFound(p) if p == &file.path) => {
            tracing::debug!("Image was moved or removed before it could be organized");
            return Ok(Action::Vanished(file.path.clone()));
        },
        Err(e) => return Err(e).or_raise(|| OrganizeErrorKind::Storage),
    }
    tracing::info!(to = %destination.display(), "Moved image");
    ctx.notifier.notice(&format!("Image moved to {}", destination.display()));

    Ok(Action::Moved(destination))
}
