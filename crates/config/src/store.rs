//! Where [`Settings`](crate::Settings) are kept between runs.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Raw storage for the persisted settings record.
///
/// Stores deal in the serialized document only; merging over defaults and
/// serializing happen in [`Settings`](crate::Settings).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Short description for logging.
    fn describe(&self) -> String;

    /// The stored document, or `None` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    async fn save(&self, contents: &str) -> Result<()>;
}

/// Settings kept in a JSON file on disk.
pub struct JsonFileStore {
    path: PathBuf,
}
impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            // A blank file is as good as no file.
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Load),
        }
    }

    async fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Save)?;
        }
        fs::write(&self.path, contents).await.or_raise(|| ErrorKind::Save)
    }
}

/// Settings kept in memory, for tests and for runs that shouldn't persist
/// anything.
#[derive(Default)]
pub struct MemoryStore {
    contents: Mutex<Option<String>>,
}
impl MemoryStore {
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }

    /// The currently stored document.
    pub async fn contents(&self) -> Option<String> {
        self.contents.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Option<String>> {
        Ok(self.contents.lock().await.clone())
    }

    async fn save(&self, contents: &str) -> Result<()> {
        *self.contents.lock().await = Some(contents.to_string());
        Ok(())
    }
}
