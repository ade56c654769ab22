use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::filter::is_image;
use crate::organize::error::{Error as OrganizeError, ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::organize::file::{Action, organize_file_inner};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, TryStreamExt};
use imgshelf_config::FailurePolicy;
use imgshelf_storage::BackendHandle;
use std::path::PathBuf;
use tracing::instrument;

/// Progress events emitted by [`organize`] as it works through the vault.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of images that need moving.
/// 3. [`Organized`](Self::Organized) or [`Failed`](Self::Failed): once per
///    discovered image, in path order.
/// 4. [`Complete`](Self::Complete): exactly once, signalling the stream is
///    finished.
///
/// Under [`FailurePolicy::FailFast`] the first failure is yielded as an `Err`
/// and ends the stream, in which case [`Complete`](Self::Complete) is never
/// emitted and no summary notice is sent.
#[derive(Debug)]
pub enum OrganizeEvent {
    /// Organizing has begun; emitted exactly once before any other event.
    Started,
    /// The vault has been listed; the number of images to move is now known.
    DiscoveryComplete(u64),
    /// An image has been organized.
    Organized(Action),
    /// An image could not be moved ([`FailurePolicy::BestEffort`] only).
    Failed(PathBuf, OrganizeError),
    /// Every discovered image has been dealt with; the stream is finished.
    Complete(Summary),
}

/// What a finished sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub moved: u64,
    /// Images left where they were because moving them failed.
    pub failed: Vec<PathBuf>,
}
impl Summary {
    /// The notice sent at the end of a sweep.
    pub fn message(&self) -> String {
        match self.moved {
            0 => "No images to organize.".to_string(),
            n => format!("Organized {n} image(s)."),
        }
    }
}

/// Streams [`OrganizeEvent`]s while moving every image in the vault into the
/// destination folder.
///
/// The vault is listed once up front. Images already directly inside the
/// destination folder are left out of the count; the rest are moved one at
/// a time with [`organize_file`](crate::organize::organize_file), so each
/// move sees the folder as the previous one left it.
///
/// With no destination folder configured nothing is discovered and the
/// stream completes straight away.
pub fn organize<'a>(
    backend: &'a BackendHandle,
    ctx: &'a Context,
) -> impl Stream<Item = LibraryResult<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macro-specific syntax such as
    // `for await` even using the parentheses trick.
    stream! {
        for await event in organize_inner(backend, ctx) {
            yield event.or_raise(|| LibraryErrorKind::Sweep);
        }
    }
}

fn organize_inner<'a>(
    backend: &'a BackendHandle,
    ctx: &'a Context,
) -> impl Stream<Item = OrganizeResult<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(OrganizeEvent::Started);

        let files = match backend.list().await.or_raise(|| OrganizeErrorKind::Storage) {
            Ok(f) => f,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let mut files: Vec<_> = match ctx.folder() {
            Some(folder) => files
                .into_iter()
                .filter(|f| f.name().is_some_and(is_image) && f.parent() != folder)
                .collect(),
            None => Vec::new(),
        };
        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(backend = backend.name(), count = files.len(), "Discovered images to organize");
        yield Ok(OrganizeEvent::DiscoveryComplete(files.len() as u64));

        let mut summary = Summary::default();
        for file in files {
            match organize_file_inner(backend, ctx, &file).await {
                Ok(action) => {
                    if matches!(action, Action::Moved(_)) {
                        summary.moved += 1;
                    }
                    yield Ok(OrganizeEvent::Organized(action));
                },
                Err(e) => match ctx.policy {
                    FailurePolicy::FailFast => {
                        yield Err(e);
                        return;
                    },
                    FailurePolicy::BestEffort => {
                        tracing::error!(path = %file.path.display(), "Could not organize image: {e:?}");
                        summary.failed.push(file.path.clone());
                        yield Ok(OrganizeEvent::Failed(file.path, e));
                    },
                },
            }
        }

        ctx.notifier.notice(&summary.message());
        yield Ok(OrganizeEvent::Complete(summary));
    })
}

/// Runs [`organize`] to completion and returns its [`Summary`].
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Sweep>`](LibraryErrorKind::Sweep) if
/// listing the vault fails, or on the first failed move under
/// [`FailurePolicy::FailFast`].
#[instrument(skip_all, fields(backend = backend.name()))]
pub async fn sweep(backend: &BackendHandle, ctx: &Context) -> LibraryResult<Summary> {
    let mut events = std::pin::pin!(organize(backend, ctx));
    let mut summary = Summary::default();
    while let Some(event) = events.try_next().await? {
        if let OrganizeEvent::Complete(s) = event {
            summary = s;
        }
    }
    tracing::info!(moved = summary.moved, failed = summary.failed.len(), "Sweep finished");
    Ok(summary)
}
