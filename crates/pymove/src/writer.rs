//! Splices rewritten statements back into their files and saves them atomically.
use std::fs;
use std::io::Write;
use std::path::Path;

use log::debug;
use ruff_text_size::TextRange;
use tempfile::NamedTempFile;

use crate::error::SkipReason;

/// New text for one statement span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Span in the original source
    pub range: TextRange,
    /// Rendered statement, without a trailing newline
    pub text: String,
}

impl Replacement {
    pub fn new(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

/// Replace each span of `source`; every byte outside the spans is kept.
///
/// Overlapping replacements are not supported; statement spans never overlap.
pub fn apply_replacements(source: &str, replacements: &[Replacement]) -> String {
    let mut ordered: Vec<&Replacement> = replacements.iter().collect();
    ordered.sort_by_key(|r| r.range.start());

    let mut output = String::with_capacity(source.len());
    let mut last = 0usize;
    for replacement in ordered {
        let start = usize::from(replacement.range.start());
        let end = usize::from(replacement.range.end());
        output.push_str(&source[last..start]);
        output.push_str(&replacement.text);
        last = end;
    }
    output.push_str(&source[last..]);
    output
}

/// Write `contents` to `path` through a temporary file in the same directory, so the file is
/// either fully replaced or untouched
pub fn save_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Rewrite one file on disk
pub fn write_file(path: &Path, source: &str, replacements: &[Replacement]) -> Result<(), SkipReason> {
    let rewritten = apply_replacements(source, replacements);
    save_atomic(path, &rewritten).map_err(|err| SkipReason::Write(err.to_string()))?;
    debug!(
        "Rewrote {} import statement(s) in {:?}",
        replacements.len(),
        path
    );
    Ok(())
}
