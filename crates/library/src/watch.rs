use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::filter::is_image;
use crate::organize::{Action, organize_file};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use imgshelf_storage::BackendHandle;

/// Moves images into the destination folder as the vault reports them
/// created.
///
/// The backend subscription is registered when this is called, so files
/// created before the stream is first polled are still seen. Files that
/// aren't images are skipped without a trace. Every image yields the
/// [`Action`] taken or the error that stopped it; neither ends the stream,
/// which runs for as long as the backend keeps reporting.
pub fn watch<'a>(backend: &'a BackendHandle, ctx: &'a Context) -> impl Stream<Item = Result<Action>> + 'a {
    let created = backend.watch();
    tracing::info!(backend = backend.name(), "Watching for new images");
    stream! {
        for await file in created {
            let file = match file.or_raise(|| ErrorKind::Watch) {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!("Could not read creation event: {e:?}");
                    yield Err(e);
                    continue;
                },
            };
            if !file.name().is_some_and(is_image) {
                continue;
            }
            let result = organize_file(backend, ctx, &file).await;
            if let Err(e) = &result {
                tracing::error!(path = %file.path.display(), "Could not organize new image: {e:?}");
            }
            yield result;
        }
    }
}
