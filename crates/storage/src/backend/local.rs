//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! The vault is a directory on disk, accessed via `tokio::fs` for async I/O and
//! watched for new files with [`notify`].

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::path::{validate as validate_path, visible};
use crate::{FileInfo, StorageBackend, error::Result};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::sync::mpsc;

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Stores files in a directory on the local filesystem. All paths are relative
/// to the configured root directory.
///
/// Entries whose name starts with a `.` (and everything beneath them) are not
/// part of the vault: they are never listed or reported by [`watch()`](StorageBackend::watch).
///
/// # Examples
///
/// ```no_run
/// use imgshelf_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("vault", "/path/to/vault")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the vault
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Arguments
    /// * `root` - Absolute path to the vault root directory
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Non-async; it only happens once on startup and an async
            // constructor isn't worth the hassle.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a relative storage path.
    ///
    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path under the root back to a vault path, or
    /// `None` for the root itself and anything hidden.
    fn visible_path(&self, absolute: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let absolute = absolute.as_ref();
        if !absolute.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!(
                "attempting to get relative path of non-absolute path `{:?}`",
                absolute
            )))
        }
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        if relative.as_os_str().is_empty() {
            return Ok(None);
        }
        visible(relative)
    }

    /// Re-use same data collection from file metadata for list, stat and watch.
    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(PathBuf::from(path), metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Classifies one directory entry during a listing walk. Pulled out of the
    /// stream so that `?` works.
    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let Some(relative) = self.visible_path(&path)? else {
            return Ok(WalkEntry::Skip);
        };
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }

    /// Turns a path reported by the watcher into a vault file, if it still is
    /// one. Files can be gone (or already moved) by the time the event is
    /// handled; that isn't an error.
    async fn created_entry(&self, absolute: &Path) -> Result<Option<FileInfo>> {
        let Some(relative) = self.visible_path(absolute)? else {
            return Ok(None);
        };
        let metadata = match fs::metadata(absolute).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, &relative)),
        };
        if !metadata.is_file() {
            return Ok(None);
        }
        Ok(Some(Self::metadata(&relative, metadata)?))
    }

    fn start_watcher(&self, tx: mpsc::UnboundedSender<notify::Result<Event>>) -> notify::Result<RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // Receiver gone means the watch stream was dropped; nothing to do.
            _ = tx.send(event);
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }
}

/// Paths that a watcher event says now hold a file that wasn't there before.
///
/// Files turn up either by being created or by being renamed into place,
/// from another folder of the vault or from outside it. A rename is reported
/// as a `To` event carrying the destination, and on some platforms again as a
/// `Both` event carrying `[from, to]`; `renamed_to` remembers the last `To`
/// so that the pair yields the destination once.
fn arrivals(event: Event, renamed_to: &mut Option<PathBuf>) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            *renamed_to = event.paths.last().cloned();
            event.paths
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let destination = event.paths.into_iter().last();
            match destination == renamed_to.take() {
                true => Vec::new(),
                false => destination.into_iter().collect(),
            }
        },
        // Platforms that can't tell the two ends of a rename apart report
        // both paths this way; the source no longer exists and is dropped
        // when it's looked up.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths,
        _ => Vec::new(),
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Removed between being seen and being walked.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        Ok(fs::create_dir_all(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, to))?;
        }
        // Map against the source path: a missing source is the common failure.
        Ok(fs::rename(&from_path, &to_path).await.map_err(|e| Self::map_io_error(e, from))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Self::metadata(&validate_path(path)?, metadata)
    }

    fn watch(&self) -> FileInfoStream<'_> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Register the watch now; events that arrive before the stream is
        // polled wait in the channel.
        let watcher = self.start_watcher(tx);

        Box::pin(stream! {
            // Keep the watcher alive for as long as the stream is.
            let _watcher = match watcher {
                Ok(w) => w,
                Err(e) => {
                    yield Err(exn::Exn::from(ErrorKind::Watch(e.to_string())));
                    return;
                },
            };
            tracing::debug!(backend = %self.name, root = %self.root.display(), "Watching vault for new files");
            let mut renamed_to: Option<PathBuf> = None;

            while let Some(event) = rx.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::Watch(e.to_string())));
                        continue;
                    },
                };
                for path in arrivals(event, &mut renamed_to) {
                    match self.created_entry(&path).await {
                        Ok(Some(file)) => yield Ok(file),
                        Ok(None) => {},
                        Err(e) => yield Err(e),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use futures::StreamExt;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("vault");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("_images/photo.png");
        assert_eq!(backend.absolute_path(Path::new("_images/photo.png")).unwrap(), expected);
        // Path traversal is prevented
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[test]
    fn test_visible_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let abs = temp_dir.path().join("_images/photo.png");
        assert_eq!(backend.visible_path(&abs).unwrap(), Some(PathBuf::from("_images/photo.png")));
        assert_eq!(backend.visible_path(temp_dir.path().join(".imgshelf/settings.json")).unwrap(), None);
        assert_eq!(backend.visible_path(temp_dir.path()).unwrap(), None);
        // Path outside root fails
        let outside = PathBuf::from("/other/photo.png");
        assert!(backend.visible_path(&outside).is_err());
    }

    #[tokio::test]
    async fn test_exists_sees_files_and_folders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(Path::new("photo.png")).await.unwrap());
        backend.write(Path::new("_images/photo.png"), b"png").await.unwrap();
        assert!(backend.exists(Path::new("_images/photo.png")).await.unwrap());
        assert!(backend.exists(Path::new("_images")).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.create_dir(Path::new("assets/_images")).await.unwrap();
        assert!(temp_dir.path().join("assets/_images").is_dir());
        // Second attempt reports the folder is already there
        let err = backend.create_dir(Path::new("assets/_images")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_rename() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("photo.jpg"), b"jpeg").await.unwrap();
        backend.rename(Path::new("photo.jpg"), Path::new("_images/photo.jpg")).await.unwrap();
        assert!(!backend.exists(Path::new("photo.jpg")).await.unwrap());
        assert_eq!(std::fs::read(temp_dir.path().join("_images/photo.jpg")).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_rename_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.rename(Path::new("missing.png"), Path::new("_images/missing.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("a/photo.gif"), b"GIF89a").await.unwrap();
        let info = backend.stat(Path::new("a/photo.gif")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("a/photo.gif"));
        assert_eq!(info.size, 6);
        assert_eq!(info.parent(), Path::new("a"));
    }

    #[tokio::test]
    async fn test_list_skips_folders_and_hidden_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("photo.jpg"), b"data").await.unwrap();
        backend.write(Path::new("notes/readme.md"), b"data").await.unwrap();
        backend.write(Path::new(".imgshelf/settings.json"), b"{}").await.unwrap();
        backend.write(Path::new(".hidden.png"), b"data").await.unwrap();
        backend.create_dir(Path::new("empty")).await.unwrap();
        let mut paths: Vec<_> = backend.list().await.unwrap().into_iter().map(|f| f.path).collect();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("notes/readme.md"), PathBuf::from("photo.jpg")]);
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.exists(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.create_dir(Path::new("../../escape")).await.is_err());
        assert!(backend.rename(Path::new("a.png"), Path::new("../a.png")).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_reports_created_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let mut created = backend.watch();
        std::fs::write(temp_dir.path().join("photo.png"), b"png").unwrap();
        let file = tokio::time::timeout(Duration::from_secs(5), created.next())
            .await
            .expect("no creation event within 5s")
            .unwrap()
            .unwrap();
        assert_eq!(file.path, PathBuf::from("photo.png"));
    }

    /// Drain the watch until `name` is reported. Other events (the partial
    /// file being created, metadata changes) are allowed before it.
    async fn reported(created: &mut FileInfoStream<'_>, name: &str) -> FileInfo {
        let wanted = PathBuf::from(name);
        let wait = async {
            loop {
                let file = created.next().await.expect("watch ended").unwrap();
                if file.path == wanted {
                    return file;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait).await.unwrap_or_else(|_| panic!("{name} not reported within 5s"))
    }

    #[tokio::test]
    async fn test_watch_reports_files_renamed_into_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("photo.png.part"), b"png").unwrap();
        let mut created = backend.watch();
        std::fs::rename(temp_dir.path().join("photo.png.part"), temp_dir.path().join("photo.png")).unwrap();
        let file = reported(&mut created, "photo.png").await;
        assert_eq!(file.size, 3);
    }

    #[tokio::test]
    async fn test_watch_reports_files_moved_in_from_outside() {
        let outside = tempfile::tempdir().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        std::fs::write(outside.path().join("cat.jpg"), b"jpeg").unwrap();
        let mut created = backend.watch();
        std::fs::rename(outside.path().join("cat.jpg"), temp_dir.path().join("cat.jpg")).unwrap();
        reported(&mut created, "cat.jpg").await;
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths.iter().fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_arrivals() {
        let mut renamed_to = None;
        let create = event(EventKind::Create(notify::event::CreateKind::File), &["/v/new.png"]);
        assert_eq!(arrivals(create, &mut renamed_to), vec![PathBuf::from("/v/new.png")]);

        let from = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/v/a.part"]);
        assert!(arrivals(from, &mut renamed_to).is_empty());
        let to = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/v/a.png"]);
        assert_eq!(arrivals(to, &mut renamed_to), vec![PathBuf::from("/v/a.png")]);
        // The matching pair event repeats the destination
        let both = event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["/v/a.part", "/v/a.png"]);
        assert!(arrivals(both, &mut renamed_to).is_empty());

        // Without a preceding `To` the pair event is the only report
        let both = event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["/v/b.part", "/v/b.png"]);
        assert_eq!(arrivals(both, &mut renamed_to), vec![PathBuf::from("/v/b.png")]);

        let written = event(EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)), &["/v/a.png"]);
        assert!(arrivals(written, &mut renamed_to).is_empty());
        let removed = event(EventKind::Remove(notify::event::RemoveKind::File), &["/v/a.png"]);
        assert!(arrivals(removed, &mut renamed_to).is_empty());
    }
}
