/// Extensions (compared case-insensitively, without the dot) that mark a file
/// as an image.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Whether a file name ends in one of the [`IMAGE_EXTENSIONS`].
///
/// Only the text after the last `.` counts, so `archive.png.zip` is not an
/// image and `.png` is.
pub fn is_image(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
