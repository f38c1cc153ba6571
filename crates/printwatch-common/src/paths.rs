//! Path utilities for detecting artwork files by extension.
//!
//! Only PNG and JPEG artwork is turned into products. The check is purely
//! extension based and case-insensitive; it never touches the filesystem.

use std::path::Path;

/// Extensions accepted by the watcher and by manual submission.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Check if a path has an eligible artwork extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use printwatch_common::paths::is_eligible_image;
///
/// assert!(is_eligible_image(Path::new("design.png")));
/// assert!(is_eligible_image(Path::new("/art/Cover.JPEG")));
/// assert!(!is_eligible_image(Path::new("design.gif")));
/// assert!(!is_eligible_image(Path::new("png")));
/// ```
pub fn is_eligible_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get the list of eligible artwork extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}
