//! Readonly storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and prevents write operations from executing, but
//! indicating success on return. It backs dry runs.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result, file::FileInfo};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all mutations, logging an
/// [`info event`](tracing::Event) describing what would have happened.
/// Listings, existence checks and watch streams pass straight through.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        self.inner.list_stream()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(path = %path.display(), bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Skipping folder creation during read-only mode");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tracing::info!(from = %from.display(), to = %to.display(), "Skipping rename/move during read-only mode");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    fn watch(&self) -> FileInfoStream<'_> {
        self.inner.watch()
    }
}
