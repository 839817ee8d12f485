//! Path utilities for detecting file types by extension.
//!
//! These are used by the scanner to decide which files carry timestamps worth
//! reconciling, and by the AVCHD index to find playlist and clip files.

use std::path::Path;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mts", "m2ts", "mp4", "mov", "m4v", "avi", "mkv", "3gp", "mpg", "mpeg",
];

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "tif", "tiff", "png", "heic", "heif", "dng", "nef", "cr2", "cr3", "arw",
    "orf", "rw2",
];

/// Extension of AVCHD session-index (playlist) files.
pub const PLAYLIST_EXTENSION: &str = "MPL";

/// Extension of AVCHD clip stream files.
pub const CLIP_EXTENSION: &str = "MTS";

fn has_extension_in(path: &Path, list: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| list.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected))
}

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use retimer_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.MOV")));
/// assert!(is_video_file(Path::new("/card/AVCHD/BDMV/STREAM/00127.MTS")));
/// assert!(!is_video_file(Path::new("photo.jpg")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    has_extension_in(path, VIDEO_EXTENSIONS)
}

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use retimer_common::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("DSC_0001.JPG")));
/// assert!(!is_image_file(Path::new("clip.mov")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    has_extension_in(path, IMAGE_EXTENSIONS)
}

/// Check if a path is an AVCHD playlist (`*.MPL`).
pub fn is_playlist_file(path: &Path) -> bool {
    has_extension(path, PLAYLIST_EXTENSION)
}

/// Check if a path is an AVCHD clip stream (`*.MTS`).
pub fn is_clip_file(path: &Path) -> bool {
    has_extension(path, CLIP_EXTENSION)
}

/// Check if the final path component is a dot-file.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Get the list of video file extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}
