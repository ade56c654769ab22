//! File references handed out by storage backends.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// A file known to a storage backend.
///
/// Backends hand these out from listings, `stat` calls and watch streams;
/// callers inspect [`name()`](Self::name) and [`parent()`](Self::parent) and
/// pass the reference back to the backend when they want it moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from the vault root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }

    /// Base name plus extension. `None` for paths without a final component
    /// or with a non-UTF8 one.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Folder containing the file, relative to the vault root. Files at the
    /// root have an empty parent.
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileInfo {
        FileInfo::new(path, 0, OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn test_name() {
        assert_eq!(file("photo.jpg").name(), Some("photo.jpg"));
        assert_eq!(file("_images/logo.png").name(), Some("logo.png"));
        assert_eq!(file("notes/readme").name(), Some("readme"));
    }

    #[test]
    fn test_parent() {
        assert_eq!(file("photo.jpg").parent(), Path::new(""));
        assert_eq!(file("_images/logo.png").parent(), Path::new("_images"));
        assert_eq!(file("a/b/c.gif").parent(), Path::new("a/b"));
    }
}
