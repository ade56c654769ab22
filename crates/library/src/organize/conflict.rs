use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use exn::ResultExt;
use imgshelf_storage::BackendHandle;
use std::path::{Path, PathBuf};

/// Suffixes tried before giving up with [`OrganizeErrorKind::Conflict`].
const MAX_PROBES: u32 = 10_000;

/// Splits a file name at its last `.` into base name and extension, the
/// extension keeping its dot. Without a dot the whole name is the base.
///
/// ```
/// use imgshelf_library::organize::split_name;
///
/// assert_eq!(split_name("img.png"), ("img", ".png"));
/// assert_eq!(split_name("my.holiday.jpg"), ("my.holiday", ".jpg"));
/// assert_eq!(split_name("photo"), ("photo", ""));
/// ```
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    }
}

/// Finds a path in `folder` where a file called `name` can go without
/// replacing anything.
///
/// Returns `folder/name` if nothing is there, otherwise the first free
/// `folder/base-N.ext` for N = 1, 2, 3, … (no padding). Names without an
/// extension probe as `base-N`. Any entry counts as occupying a name,
/// folders included.
///
/// The answer is only good until something else creates a file at that path.
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Organize>`](LibraryErrorKind::Organize)
/// when an existence check fails or no free name turns up within the probe
/// limit.
pub async fn unique_path(backend: &BackendHandle, folder: &Path, name: &str) -> LibraryResult<PathBuf> {
    unique_path_inner(backend, folder, name).await.or_raise(|| LibraryErrorKind::Organize)
}

pub(crate) async fn unique_path_inner(backend: &BackendHandle, folder: &Path, name: &str) -> OrganizeResult<PathBuf> {
    let (base, extension) = split_name(name);
    let mut candidate = folder.join(name);
    let mut counter: u32 = 1;
    while backend.exists(&candidate).await.or_raise(|| OrganizeErrorKind::Storage)? {
        if counter > MAX_PROBES {
            tracing::error!(folder = %folder.display(), name, "Gave up looking for a free name");
            exn::bail!(OrganizeErrorKind::Conflict);
        }
        candidate = folder.join(format!("{base}-{counter}{extension}"));
        counter += 1;
    }
    tracing::trace!(candidate = %candidate.display(), probes = counter, "Resolved free name");
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgshelf_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;

    fn backend(files: &[&str]) -> BackendHandle {
        Arc::new(MockBackend::with_files(files.iter().map(|f| (*f, Vec::from(*b"x")))))
    }

    #[rstest]
    #[case("img.png", ("img", ".png"))]
    #[case("a.b.c.gif", ("a.b.c", ".gif"))]
    #[case("photo", ("photo", ""))]
    #[case(".png", ("", ".png"))]
    #[case("trailing.", ("trailing", "."))]
    fn test_split_name(#[case] name: &str, #[case] expected: (&str, &str)) {
        assert_eq!(split_name(name), expected);
    }

    #[tokio::test]
    async fn test_free_name_is_kept() {
        let backend = backend(&["photo.jpg", "other/photo.jpg"]);
        let path = unique_path(&backend, Path::new("_images"), "photo.jpg").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/photo.jpg"));
    }

    #[tokio::test]
    async fn test_first_collision_gets_suffix_one() {
        let backend = backend(&["_images/img.png"]);
        let path = unique_path(&backend, Path::new("_images"), "img.png").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/img-1.png"));
    }

    #[tokio::test]
    async fn test_probe_is_monotonic() {
        let backend = backend(&["_images/img.png", "_images/img-1.png", "_images/img-2.png", "_images/img-4.png"]);
        let path = unique_path(&backend, Path::new("_images"), "img.png").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/img-3.png"));
    }

    #[tokio::test]
    async fn test_gap_at_one_is_reused() {
        let backend = backend(&["_images/img.png", "_images/img-2.png"]);
        let path = unique_path(&backend, Path::new("_images"), "img.png").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/img-1.png"));
    }

    #[tokio::test]
    async fn test_suffix_is_not_padded() {
        let files: Vec<String> = std::iter::once("_images/img.png".to_string())
            .chain((1..=9).map(|n| format!("_images/img-{n}.png")))
            .collect();
        let backend: BackendHandle =
            Arc::new(MockBackend::with_files(files.iter().map(|f| (f.as_str(), Vec::from(*b"x")))));
        let path = unique_path(&backend, Path::new("_images"), "img.png").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/img-10.png"));
    }

    #[tokio::test]
    async fn test_name_without_extension() {
        let backend = backend(&["_images/photo"]);
        let path = unique_path(&backend, Path::new("_images"), "photo").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/photo-1"));
    }

    #[tokio::test]
    async fn test_only_last_dot_splits() {
        let backend = backend(&["_images/my.holiday.jpg"]);
        let path = unique_path(&backend, Path::new("_images"), "my.holiday.jpg").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/my.holiday-1.jpg"));
    }

    #[tokio::test]
    async fn test_folder_occupies_name() {
        // A folder called `scan.png` blocks the name as much as a file does.
        let backend = backend(&["_images/scan.png/inner.txt"]);
        let path = unique_path(&backend, Path::new("_images"), "scan.png").await.unwrap();
        assert_eq!(path, PathBuf::from("_images/scan-1.png"));
    }

    #[tokio::test]
    async fn test_nested_destination() {
        let backend = backend(&["media/images/a.gif"]);
        let path = unique_path(&backend, Path::new("media/images"), "a.gif").await.unwrap();
        assert_eq!(path, PathBuf::from("media/images/a-1.gif"));
    }
}
