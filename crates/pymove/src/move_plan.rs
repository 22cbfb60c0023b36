//! Move plans: the flat table of `old -> new` module paths a single move produces.
//!
//! Directory moves are flattened into one entry per contained module (and per package
//! directory), so the rewriter only ever does a longest-prefix lookup.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, trace, warn};
use rustc_hash::FxHashSet;
use walkdir::WalkDir;

use crate::error::{MoveError, Result};
use crate::resolver::{ModulePath, ModuleResolver};

/// One before/after pair of dotted module paths
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoveEntry {
    /// Module path before the move
    pub old: ModulePath,
    /// Module path after the move
    pub new: ModulePath,
}

impl MoveEntry {
    /// Entry moving `old` to `new`
    pub fn new(old: ModulePath, new: ModulePath) -> Self {
        Self { old, new }
    }
}

/// Set of move entries keyed by `old`; immutable once handed to a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovePlan {
    entries: IndexMap<ModulePath, ModulePath>,
}

impl MovePlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from explicit entries
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = MoveEntry>,
    {
        let mut plan = Self::new();
        for entry in entries {
            plan.insert(entry)?;
        }
        Ok(plan)
    }

    /// Add an entry. A no-op entry, or a second entry for the same `old` path with a different
    /// `new` path, is rejected.
    pub fn insert(&mut self, entry: MoveEntry) -> Result<()> {
        if entry.old == entry.new {
            return Err(MoveError::invalid(
                entry.old.to_string(),
                "module would keep its name",
            ));
        }
        if let Some(existing) = self.entries.get(&entry.old) {
            if existing != &entry.new {
                return Err(MoveError::invalid(
                    entry.old.to_string(),
                    format!("module would move to both {} and {}", existing, entry.new),
                ));
            }
            return Ok(());
        }
        trace!("Plan entry: {} -> {}", entry.old, entry.new);
        self.entries.insert(entry.old, entry.new);
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan moves nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ModulePath, &ModulePath)> {
        self.entries.iter()
    }

    /// New path for an exact `old` match
    pub fn get(&self, old: &ModulePath) -> Option<&ModulePath> {
        self.entries.get(old)
    }

    /// Longest-prefix lookup: `module` with the prefix matching the most specific entry's `old`
    /// path replaced by that entry's `new` path.
    ///
    /// When an entry moves a module below its own old name (`models` to `models.core`), a module
    /// already under the new name is left alone, so relocating twice is the same as once.
    pub fn relocate(&self, module: &ModulePath) -> Option<ModulePath> {
        let segments = module.segments();
        for len in (1..=segments.len()).rev() {
            let Some(prefix) = ModulePath::new(segments[..len].iter().cloned()) else {
                continue;
            };
            let Some((old, new)) = self.entries.get_key_value(&prefix) else {
                continue;
            };
            if new.is_descendant_of(old) && module.starts_with(new) {
                trace!("{} is already below {}", module, new);
                return None;
            }
            return module.replace_prefix(old, new);
        }
        None
    }

    /// Plan for moving `old_path` to `new_path` before anything is touched on disk
    pub fn build(old_path: &Path, new_path: &Path, resolver: &ModuleResolver<'_>) -> Result<Self> {
        let request = MoveRequest::resolve(old_path, new_path, resolver)?;
        Self::for_request(&request, resolver)
    }

    /// Plan for a move that already happened on disk: `old_path` is gone and `new_path` exists
    pub fn build_after_move(
        old_path: &Path,
        new_path: &Path,
        resolver: &ModuleResolver<'_>,
    ) -> Result<Self> {
        let source = resolver.resolve(old_path);
        let destination = resolver.resolve(new_path);

        if !destination.exists() {
            return Err(MoveError::invalid(&destination, "destination does not exist"));
        }
        if source == destination {
            return Err(MoveError::invalid(&source, "source and destination are identical"));
        }
        if source.exists() {
            return Err(MoveError::invalid(&source, "source still exists"));
        }
        check_inside_root(&source, resolver)?;
        check_inside_root(&destination, resolver)?;

        let mut plan = Self::new();
        if destination.is_dir() {
            let old_prefix = resolver
                .dir_to_module(&source)
                .map_err(MoveError::into_invalid_move)?;
            let new_prefix = resolver
                .dir_to_module(&destination)
                .map_err(MoveError::into_invalid_move)?;
            for new in directory_modules(&destination, &new_prefix, resolver) {
                if let Some(old) = new.replace_prefix(&new_prefix, &old_prefix) {
                    plan.insert_checked(old, new)?;
                }
            }
        } else {
            let source = with_default_extension(source, &destination);
            let old = resolver
                .file_to_module(&source)
                .map_err(MoveError::into_invalid_move)?;
            let new = resolver
                .file_to_module(&destination)
                .map_err(MoveError::into_invalid_move)?;
            plan.insert_checked(old, new)?;
        }

        debug!("Plan for completed move has {} entries", plan.len());
        Ok(plan)
    }

    /// Plan for an already validated move request
    pub fn for_request(request: &MoveRequest, resolver: &ModuleResolver<'_>) -> Result<Self> {
        let mut plan = Self::new();
        match request.kind {
            MoveKind::File => {
                let old = resolver
                    .file_to_module(&request.source)
                    .map_err(MoveError::into_invalid_move)?;
                let new = resolver
                    .file_to_module(&request.destination)
                    .map_err(MoveError::into_invalid_move)?;
                if old == new {
                    return Err(MoveError::invalid(
                        &request.source,
                        format!("module {old} would keep its name"),
                    ));
                }
                plan.insert_checked(old, new)?;
            }
            MoveKind::Directory => {
                let old_prefix = resolver
                    .dir_to_module(&request.source)
                    .map_err(MoveError::into_invalid_move)?;
                let new_prefix = resolver
                    .dir_to_module(&request.destination)
                    .map_err(MoveError::into_invalid_move)?;
                for old in directory_modules(&request.source, &old_prefix, resolver) {
                    if let Some(new) = old.replace_prefix(&old_prefix, &new_prefix) {
                        plan.insert_checked(old, new)?;
                    }
                }
            }
        }

        debug!(
            "Plan for {:?} -> {:?} has {} entries",
            request.source,
            request.destination,
            plan.len()
        );
        for (old, new) in plan.iter() {
            debug!("  {} -> {}", old, new);
        }
        Ok(plan)
    }

    /// Insert an entry computed from paths, dropping pairs no import statement can express
    fn insert_checked(&mut self, old: ModulePath, new: ModulePath) -> Result<()> {
        if !old.is_importable() {
            debug!("Skipping {}: not importable by name", old);
            return Ok(());
        }
        if !new.is_importable() {
            warn!(
                "Imports of {} will not be rewritten: {} is not a valid module name",
                old, new
            );
            return Ok(());
        }
        self.insert(MoveEntry::new(old, new))
    }
}

/// What kind of entity a move relocates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    File,
    Directory,
}

/// A validated move: absolute source and fully resolved destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub source: PathBuf,
    /// Final location, with the source's base name or extension filled in
    pub destination: PathBuf,
    pub kind: MoveKind,
}

impl MoveRequest {
    /// Validate a move of `old_path` to `new_path`.
    ///
    /// A destination naming an existing directory receives the source's file name. A file
    /// destination without an extension gets the source's extension.
    pub fn resolve(old_path: &Path, new_path: &Path, resolver: &ModuleResolver<'_>) -> Result<Self> {
        let source = resolver.resolve(old_path);
        if !source.exists() {
            return Err(MoveError::invalid(&source, "source does not exist"));
        }
        check_inside_root(&source, resolver)?;

        let kind = if source.is_dir() {
            MoveKind::Directory
        } else if resolver.config().has_source_extension(&source) {
            MoveKind::File
        } else {
            return Err(MoveError::NotASourceFile(source).into_invalid_move());
        };

        let mut destination = resolver.resolve(new_path);
        if destination.is_dir() {
            if let Some(name) = source.file_name() {
                destination = destination.join(name);
            }
        }
        if kind == MoveKind::File {
            destination = with_default_extension(destination, &source);
        }

        if destination == source {
            return Err(MoveError::invalid(&source, "source and destination are identical"));
        }
        if destination.exists() {
            return Err(MoveError::invalid(&destination, "destination already exists"));
        }
        if kind == MoveKind::Directory && destination.starts_with(&source) {
            return Err(MoveError::invalid(
                &destination,
                "cannot move a directory into itself",
            ));
        }
        check_inside_root(&destination, resolver)?;

        Ok(Self {
            source,
            destination,
            kind,
        })
    }
}

fn check_inside_root(path: &Path, resolver: &ModuleResolver<'_>) -> Result<()> {
    if resolver.is_inside_root(path) {
        Ok(())
    } else {
        Err(MoveError::invalid(
            path,
            format!("not inside repository root {}", resolver.root().display()),
        ))
    }
}

/// Give `path` the extension of `template` when it has none
fn with_default_extension(path: PathBuf, template: &Path) -> PathBuf {
    match (path.extension(), template.extension()) {
        (None, Some(ext)) => path.with_extension(ext),
        _ => path,
    }
}

/// Every module below `dir` (inclusive) under the dotted name `prefix`: source files, packages
/// with an initializer, and (when enabled) namespace package directories holding sources
fn directory_modules(
    dir: &Path,
    prefix: &ModulePath,
    resolver: &ModuleResolver<'_>,
) -> Vec<ModulePath> {
    let config = resolver.config();
    let mut modules = Vec::new();
    let mut seen = FxHashSet::default();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !resolver.is_excluded(entry))
        .filter_map(|entry| entry.ok());

    for entry in walker {
        if !entry.file_type().is_file() || !config.has_source_extension(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let Some(module) = relative_module(prefix, relative) else {
            trace!("Ignoring {:?}: no module name", entry.path());
            continue;
        };

        if config.namespace_packages {
            // every directory between the moved root and the file is a package too
            let mut ancestor = module.parent();
            while let Some(package) = ancestor {
                if package.len() < prefix.len() {
                    break;
                }
                ancestor = package.parent();
                if seen.insert(package.clone()) {
                    modules.push(package);
                }
            }
        }
        if seen.insert(module.clone()) {
            modules.push(module);
        }
    }

    modules
}

/// Module path of `relative` (a file path below a directory named `prefix`)
fn relative_module(prefix: &ModulePath, relative: &Path) -> Option<ModulePath> {
    let mut segments: Vec<String> = prefix.segments().to_vec();
    let components: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let (file, dirs) = components.split_last()?;
    segments.extend(dirs.iter().map(|&d| d.to_owned()));
    let stem = Path::new(file).file_stem()?.to_str()?;
    if stem != crate::resolver::INIT_STEM {
        segments.push(stem.to_owned());
    }
    ModulePath::new(segments)
}
