//! The physical move of a file or directory.
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use walkdir::WalkDir;

use crate::error::{MoveError, Result};

/// Performs the on-disk move; invoked once per move request
pub trait FileMover {
    fn move_path(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Moves paths with a plain rename, creating missing parent directories first.
///
/// When source and destination sit on different filesystems the tree is copied and the source
/// removed afterwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMover;

impl FileMover for FsMover {
    fn move_path(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| MoveError::Filesystem {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        match fs::rename(source, destination) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                debug!("{:?} is on another device, copying instead", destination);
                copy_then_remove(source, destination)?;
            }
            Err(err) => {
                return Err(MoveError::Filesystem {
                    path: source.to_path_buf(),
                    source: err,
                });
            }
        }
        info!("Moved {:?} to {:?}", source, destination);
        Ok(())
    }
}

/// Copy `source` (file or directory tree) to `destination`, then delete `source`.
///
/// The source is only removed once every entry has been copied.
fn copy_then_remove(source: &Path, destination: &Path) -> Result<()> {
    let filesystem = |path: &Path| {
        let path = path.to_path_buf();
        move |source| MoveError::Filesystem { path, source }
    };

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| MoveError::Filesystem {
            path: err.path().unwrap_or(source).to_path_buf(),
            source: err.into(),
        })?;
        let target = match entry.path().strip_prefix(source) {
            Ok(relative) if entry.depth() > 0 => destination.join(relative),
            _ => destination.to_path_buf(),
        };
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(filesystem(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(filesystem(&target))?;
        }
    }

    if source.is_dir() {
        fs::remove_dir_all(source).map_err(filesystem(source))
    } else {
        fs::remove_file(source).map_err(filesystem(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_creates_parent_directories() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("module.py");
        fs::write(&source, "x = 1\n").expect("write");
        let destination = temp.path().join("sub").join("package").join("module.py");

        FsMover.move_path(&source, &destination).expect("move");
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(destination).expect("read"), "x = 1\n");
    }

    #[test]
    fn test_missing_source_is_filesystem_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = FsMover
            .move_path(&temp.path().join("nope.py"), &temp.path().join("b.py"))
            .expect_err("source is missing");
        assert!(matches!(err, MoveError::Filesystem { .. }));
    }

    #[test]
    fn test_copy_then_remove_moves_tree() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("pkg");
        fs::create_dir_all(source.join("sub")).expect("mkdir");
        fs::write(source.join("__init__.py"), "").expect("write");
        fs::write(source.join("sub").join("mod.py"), "x = 1\n").expect("write");
        let destination = temp.path().join("lib").join("pkg");
        fs::create_dir_all(temp.path().join("lib")).expect("mkdir");

        copy_then_remove(&source, &destination).expect("copy");

        assert!(!source.exists());
        assert!(destination.join("__init__.py").is_file());
        assert_eq!(
            fs::read_to_string(destination.join("sub").join("mod.py")).expect("read"),
            "x = 1\n"
        );
    }

    #[test]
    fn test_copy_then_remove_moves_file() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("module.py");
        fs::write(&source, "y = 2\n").expect("write");
        let destination = temp.path().join("renamed.py");

        copy_then_remove(&source, &destination).expect("copy");

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(destination).expect("read"), "y = 2\n");
    }
}
