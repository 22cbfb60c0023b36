use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Make `path` absolute against `base` (unless it already is) and clean it lexically.
/// The filesystem is not consulted, so symlinks are left alone.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    base.join(path).clean()
}

/// Render `path` relative to `root` for messages, falling back to the full path
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
