//! Vault-relative paths.
//!
//! Backends are only ever handed paths relative to the vault root.
//! [`validate`] brings a path into that shape, and [`visible`] additionally
//! decides whether the organizer should see it at all.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Resolve `path` against the vault root without touching the filesystem.
///
/// A leading `/` and any `.` components are dropped and `..` cancels the
/// component before it. The result is an error if it would climb above the
/// root, if it comes out empty, or if a name holds a NUL byte.
///
/// ```
/// use std::path::Path;
/// use imgshelf_storage::validate_path;
///
/// assert_eq!(validate_path("/notes/./trip/../map.jpg").unwrap(), Path::new("notes/map.jpg"));
/// assert!(validate_path("notes/../../map.jpg").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(raw.to_path_buf()));

    let mut resolved = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(name) if !name.as_encoded_bytes().contains(&0) => resolved.push(name),
            Component::RootDir | Component::CurDir => {},
            Component::ParentDir if resolved.pop() => {},
            _ => return Err(invalid()),
        }
    }
    match resolved.as_os_str().is_empty() {
        true => Err(invalid()),
        false => Ok(resolved),
    }
}

/// Whether any component of a vault-relative path is a dot-name.
///
/// Dot-folders hold vault metadata (the settings file among them) and trash;
/// nothing in them is organized.
pub fn is_hidden(relative: &Path) -> bool {
    relative.iter().any(|name| name.as_encoded_bytes().starts_with(b"."))
}

/// [`validate`] `path`, then hand it back only if it is not [hidden](is_hidden).
///
/// Listing and watching both go through here, so the two agree on what
/// belongs to the vault.
pub fn visible(path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    let resolved = validate(path)?;
    Ok((!is_hidden(&resolved)).then_some(resolved))
}
