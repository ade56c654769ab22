//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::{is_hidden, validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};

use crate::StorageBackend;

/// Capacity of the creation-event channel. Tests never get close.
const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct Tree {
    files: HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>,
    /// Folders created explicitly. Ancestors of files exist implicitly.
    dirs: HashSet<PathBuf>,
    /// Source paths that refuse to be renamed.
    denied: HashSet<PathBuf>,
}
impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self.dirs.iter().any(|d| d.starts_with(path))
            || self.files.keys().any(|f| f != path && f.starts_with(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.is_dir(path)
    }
}

/// In-memory storage backend for testing.
///
/// Files and folders live in maps behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Every
/// [`write()`](StorageBackend::write) is broadcast to active
/// [`watch()`](StorageBackend::watch) streams, which makes it a stand-in for a
/// vault that reports new files.
///
/// # Examples
///
/// ```
/// use imgshelf_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("_images/logo.png", b"png"),
/// ]);
/// assert!(backend.exists(Path::new("_images/logo.png")).await?);
/// assert!(backend.exists(Path::new("_images")).await?);
///
/// backend.write(Path::new("photo.jpg"), b"jpeg").await?;
/// assert!(backend.exists(Path::new("photo.jpg")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    tree: RwLock<Tree>,
    created: broadcast::Sender<PathBuf>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut tree = Tree::default();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            tree.files.insert(validated, (now, data.into()));
        }
        let (created, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: "mock".to_string(),
            tree: RwLock::new(tree),
            created,
        }
    }

    /// Make renames of `path` fail with
    /// [`PermissionDenied`](ErrorKind::PermissionDenied), for exercising
    /// failure handling.
    ///
    /// Panics on an invalid path, like [`with_files`](Self::with_files).
    pub fn deny_rename(mut self, path: impl AsRef<Path>) -> Self {
        let Ok(validated) = validate_path(path.as_ref()) else {
            panic!("MockBackend::deny_rename: invalid path {}", path.as_ref().display());
        };
        self.tree.get_mut().denied.insert(validated);
        self
    }

    /// Paths of every file currently stored, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.tree.read().await.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn file_info(path: &Path, size: u64, inserted: OffsetDateTime) -> FileInfo {
        FileInfo::new(path, size, inserted)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<(PathBuf, (OffsetDateTime, u64))> = {
                let guard = self.tree.read().await;
                guard
                    .files
                    .iter()
                    .filter(|(path, _)| !is_hidden(path))
                    .map(|(path, (inserted, data))| (path.clone(), (*inserted, data.len() as u64)))
                    .collect()
            };
            for (path, (inserted, size)) in entries {
                yield Ok(Self::file_info(&path, size, inserted));
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.tree.read().await.exists(&path))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let created = self.tree.write().await.files.insert(path.clone(), (OffsetDateTime::now_utc(), data.to_vec()));
        if created.is_none() {
            // No subscribers is fine.
            _ = self.created.send(path);
        }
        Ok(())
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.tree.write().await;
        if guard.exists(&path) {
            exn::bail!(ErrorKind::AlreadyExists(path));
        }
        guard.dirs.insert(path);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.tree.write().await;
        if guard.denied.contains(&from) {
            exn::bail!(ErrorKind::PermissionDenied(from));
        }
        let data = guard.files.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.files.insert(to, data);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.tree.read().await;
        let (inserted, data) = guard.files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, data.len() as u64, *inserted))
    }

    fn watch(&self) -> FileInfoStream<'_> {
        let mut created = self.created.subscribe();
        Box::pin(stream! {
            loop {
                let path = match created.recv().await {
                    Ok(path) => path,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(backend = %self.name, missed, "Watcher fell behind; creation events dropped");
                        continue;
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if is_hidden(&path) {
                    continue;
                }
                match self.stat(&path).await {
                    Ok(file) => yield Ok(file),
                    // Already renamed or removed before the event was handled.
                    Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => {},
                    Err(e) => yield Err(e),
                }
            }
        })
    }
}
