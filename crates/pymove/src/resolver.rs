//! Mapping between filesystem paths and dotted module paths.
//!
//! A module's dotted name is its path relative to the repository root with the source
//! extension stripped and separators replaced by dots. `pkg/__init__.py` names the package
//! `pkg` itself.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use log::trace;
use ruff_python_stdlib::identifiers::is_identifier;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{MoveError, Result};
use crate::util::absolutize;

/// Stem of a package initializer file
pub const INIT_STEM: &str = "__init__";

/// A non-empty dotted module path such as `pkg.sub.mod`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Build a module path from its segments. Returns `None` for an empty sequence or for a
    /// segment that is empty or contains a dot or a path separator.
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || !segments.iter().all(|s| is_valid_segment(s)) {
            return None;
        }
        Some(Self(segments))
    }

    /// Parse a dotted name such as `pkg.sub`
    pub fn parse(dotted: &str) -> Option<Self> {
        Self::new(dotted.split('.'))
    }

    /// Identifier segments, outermost package first; never empty
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments, always at least one
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the module lives directly under the repository root
    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// Last segment
    pub fn name(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// The enclosing package, `None` for a top-level module
    pub fn parent(&self) -> Option<Self> {
        if self.is_top_level() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// `self` extended with one more segment
    pub fn child(&self, name: &str) -> Option<Self> {
        if !is_valid_segment(name) {
            return None;
        }
        let mut segments = self.0.clone();
        segments.push(name.to_owned());
        Some(Self(segments))
    }

    /// `true` when `prefix` equals `self` or is one of its ancestors
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// `true` when `ancestor` is a proper prefix of `self`
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.0.len() > ancestor.0.len() && self.starts_with(ancestor)
    }

    /// Swap the leading `old` segments for `new`, keeping the remaining suffix
    pub fn replace_prefix(&self, old: &Self, new: &Self) -> Option<Self> {
        if !self.starts_with(old) {
            return None;
        }
        let mut segments = new.0.clone();
        segments.extend_from_slice(&self.0[old.0.len()..]);
        Some(Self(segments))
    }

    /// Whether every segment is a Python identifier, i.e. the module can be named by an import
    pub fn is_importable(&self) -> bool {
        self.0.iter().all(|segment| is_identifier(segment))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['.', '/', '\\'])
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for ModulePath {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{s}' is not a dotted module path"))
    }
}

/// Converts paths under one repository root to module paths and back
#[derive(Debug, Clone)]
pub struct ModuleResolver<'a> {
    root: PathBuf,
    config: &'a Config,
}

impl<'a> ModuleResolver<'a> {
    /// Map paths below `root`; a relative root is taken from the current directory
    pub fn new(root: &Path, config: &'a Config) -> Self {
        let root = if root.is_absolute() {
            absolutize(root, root)
        } else {
            let cwd = std::env::current_dir().unwrap_or_default();
            absolutize(&cwd, root)
        };
        Self { root, config }
    }

    /// The absolute repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Absolute, normalized form of `path`; relative paths are taken from the repository root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        absolutize(&self.root, path)
    }

    /// Whether `path` lies strictly inside the repository root
    pub fn is_inside_root(&self, path: &Path) -> bool {
        let path = self.resolve(path);
        path != self.root && path.starts_with(&self.root)
    }

    /// Module path of a source file or package directory.
    ///
    /// Fails with `NotASourceFile` for paths outside the root, the root itself, files without a
    /// recognised extension, and directories that are not packages.
    pub fn path_to_module(&self, path: &Path) -> Result<ModulePath> {
        let path = self.resolve(path);
        if path.is_dir() {
            if !self.is_package_dir(&path) {
                return Err(MoveError::NotASourceFile(path));
            }
            return self.dir_to_module(&path);
        }
        self.file_to_module(&path)
    }

    /// Module path of a directory, without checking that it is a package
    pub(crate) fn dir_to_module(&self, dir: &Path) -> Result<ModulePath> {
        let relative = self.relative_segments(dir)?;
        ModulePath::new(relative).ok_or_else(|| MoveError::NotASourceFile(dir.to_path_buf()))
    }

    /// Module path of a source file, without touching the filesystem
    pub(crate) fn file_to_module(&self, file: &Path) -> Result<ModulePath> {
        if !self.config.has_source_extension(file) {
            return Err(MoveError::NotASourceFile(file.to_path_buf()));
        }
        let mut segments = self.relative_segments(file)?;
        let stem = file
            .file_stem()
            .and_then(OsStr::to_str)
            .ok_or_else(|| MoveError::NotASourceFile(file.to_path_buf()))?
            .to_owned();
        segments.pop();
        if stem != INIT_STEM {
            segments.push(stem);
        }
        ModulePath::new(segments).ok_or_else(|| MoveError::NotASourceFile(file.to_path_buf()))
    }

    fn relative_segments(&self, path: &Path) -> Result<Vec<String>> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| MoveError::NotASourceFile(path.to_path_buf()))?;
        relative
            .components()
            .map(|component| match component {
                Component::Normal(name) => name
                    .to_str()
                    .map(str::to_owned)
                    .ok_or_else(|| MoveError::NotASourceFile(path.to_path_buf())),
                _ => Err(MoveError::NotASourceFile(path.to_path_buf())),
            })
            .collect()
    }

    /// File path for a module: `a/b/c.py`, or `a/b/c/__init__.py` for a package
    pub fn module_to_path(&self, module: &ModulePath, is_package: bool) -> PathBuf {
        let extension = self.config.primary_extension();
        let mut path = self.root.clone();
        for segment in module.parent().iter().flat_map(ModulePath::segments) {
            path.push(segment);
        }
        if is_package {
            path.push(module.name());
            path.push(format!("{INIT_STEM}.{extension}"));
        } else {
            path.push(format!("{}.{extension}", module.name()));
        }
        path
    }

    /// The initializer file directly inside `dir`, if any
    pub fn initializer(&self, dir: &Path) -> Option<PathBuf> {
        self.config
            .extensions
            .iter()
            .map(|ext| dir.join(format!("{INIT_STEM}.{ext}")))
            .find(|candidate| candidate.is_file())
    }

    /// Whether `dir` is importable as a package: it has an initializer, or namespace packages
    /// are enabled and it contains source files somewhere below it
    pub fn is_package_dir(&self, dir: &Path) -> bool {
        if self.initializer(dir).is_some() {
            return true;
        }
        self.config.namespace_packages && self.contains_sources(dir)
    }

    fn contains_sources(&self, dir: &Path) -> bool {
        let found = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry))
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_type().is_file() && self.config.has_source_extension(entry.path()));
        trace!("{:?} contains sources: {}", dir, found);
        found
    }

    /// Whether a walk entry is an excluded directory
    pub(crate) fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        entry.file_type().is_dir() && self.config.is_excluded_dir(entry.file_name())
    }
}
