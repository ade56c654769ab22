use crate::Context;
use crate::error::Result;
use crate::host::Confirm;
use crate::organize::Action;
use crate::startup::{Startup, startup};
use crate::watch::watch;
use futures::{Stream, StreamExt, stream};
use imgshelf_config::{Settings, SettingsStore, StartupMode};
use imgshelf_storage::BackendHandle;

/// Something a running [`session`] did.
#[derive(Debug)]
pub enum SessionEvent {
    /// The startup decision played out. Emitted exactly once.
    Started(Result<Startup>),
    /// A newly created image was dealt with. Failures don't end the session.
    Organized(Result<Action>),
}

/// Runs [`startup()`] and [`watch()`] side by side.
///
/// The watch is subscribed before this returns, ahead of the startup
/// question and the sweep, so an image pasted while the user is still
/// deciding (or while the sweep is busy) is moved too. A file picked up by
/// both ends up moved once; the loser sees it as
/// [`Action::Vanished`].
///
/// The stream keeps going after [`SessionEvent::Started`] for as long as the
/// backend reports new files.
pub fn session<'a>(
    backend: &'a BackendHandle,
    ctx: &'a Context,
    settings: &'a mut Settings,
    store: &'a dyn SettingsStore,
    mode: StartupMode,
    confirm: &'a dyn Confirm,
) -> impl Stream<Item = SessionEvent> + 'a {
    let organized = watch(backend, ctx).map(SessionEvent::Organized);
    let started = stream::once(startup(backend, ctx, settings, store, mode, confirm)).map(SessionEvent::Started);
    stream::select(started, organized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FixedAnswer, RecordingNotifier};
    use async_trait::async_trait;
    use imgshelf_config::MemoryStore;
    use imgshelf_storage::backend::{MockBackend, StorageBackend};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Drops an image into the vault while the question is open.
    struct PasteWhileAsking {
        backend: BackendHandle,
        answer: bool,
    }
    #[async_trait]
    impl Confirm for PasteWhileAsking {
        async fn confirm(&self, _prompt: &str) -> bool {
            self.backend.write(Path::new("pasted.png"), b"png").await.unwrap();
            self.answer
        }
    }

    fn vault(files: &[&str]) -> (Arc<MockBackend>, BackendHandle, Context) {
        let mock = Arc::new(MockBackend::with_files(files.iter().map(|f| (*f, Vec::from(*b"x")))));
        let backend: BackendHandle = mock.clone();
        let ctx = Context::new(&Settings::default(), Arc::new(RecordingNotifier::default())).unwrap();
        (mock, backend, ctx)
    }

    #[tokio::test]
    async fn test_image_pasted_during_question_is_moved() {
        let (mock, backend, ctx) = vault(&["photo.jpg"]);
        let store = MemoryStore::default();
        let mut settings = Settings::default();
        let confirm = PasteWhileAsking {
            backend: backend.clone(),
            answer: false,
        };

        let mut started = None;
        let mut organized = Vec::new();
        {
            let mut events =
                std::pin::pin!(session(&backend, &ctx, &mut settings, &store, StartupMode::Gated, &confirm));
            while started.is_none() || organized.is_empty() {
                match events.next().await.unwrap() {
                    SessionEvent::Started(result) => started = Some(result.unwrap()),
                    SessionEvent::Organized(action) => organized.push(action.unwrap()),
                }
            }
        }

        assert_eq!(started, Some(Startup::Declined));
        assert_eq!(organized, vec![Action::Moved(PathBuf::from("_images/pasted.png"))]);
        // Declined: the image that was already there stays put
        assert_eq!(mock.paths().await, vec![PathBuf::from("_images/pasted.png"), PathBuf::from("photo.jpg")]);
        assert!(settings.has_organized_existing);
    }

    #[tokio::test]
    async fn test_image_seen_by_sweep_and_watch_moves_once() {
        let (mock, backend, ctx) = vault(&["photo.jpg"]);
        let store = MemoryStore::default();
        let mut settings = Settings::default();
        let confirm = PasteWhileAsking {
            backend: backend.clone(),
            answer: true,
        };

        let mut events = std::pin::pin!(session(&backend, &ctx, &mut settings, &store, StartupMode::Gated, &confirm));
        let started = loop {
            if let SessionEvent::Started(result) = events.next().await.unwrap() {
                break result;
            }
        };

        assert!(matches!(started, Ok(Startup::Swept(ref summary)) if summary.failed.is_empty()));
        assert_eq!(mock.paths().await, vec![PathBuf::from("_images/pasted.png"), PathBuf::from("_images/photo.jpg")]);
    }

    #[tokio::test]
    async fn test_failed_sweep_is_reported() {
        let backend: BackendHandle =
            Arc::new(MockBackend::with_files([("photo.jpg", b"x")]).deny_rename("photo.jpg"));
        let ctx = Context::new(&Settings::default(), Arc::new(RecordingNotifier::default())).unwrap();
        let store = MemoryStore::default();
        let mut settings = Settings::default();
        let confirm = FixedAnswer::new(false);

        let mut events = std::pin::pin!(session(&backend, &ctx, &mut settings, &store, StartupMode::Always, &confirm));

        assert!(matches!(events.next().await, Some(SessionEvent::Started(Err(_)))));
    }
}
