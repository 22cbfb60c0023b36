//! Source scanner: finds every Python source under the repository root and extracts the import
//! statements that take part in matching.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{trace, warn};
use ruff_python_ast::ModModule;
use ruff_python_codegen::{Generator, Stylist};
use ruff_python_parser::{Parsed, parse_module};
use ruff_text_size::TextRange;
use walkdir::WalkDir;

use crate::config::NestingPolicy;
use crate::error::SkipReason;
use crate::import_rewriter::{ImportRewriter, ImportStatement, Refusal, Rewrite};
use crate::move_plan::MovePlan;
use crate::resolver::ModuleResolver;
use crate::visitors::ImportDiscoveryVisitor;
use crate::writer::Replacement;

/// An import statement together with the span it occupies in its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub statement: ImportStatement,
    /// Span of the whole statement, excluding trailing comments
    pub range: TextRange,
}

/// A parsed source file and the import statements eligible for rewriting
pub struct SourceFile {
    pub path: PathBuf,
    /// Contents as read from disk
    pub source: String,
    /// Candidate statements in source order
    pub imports: Vec<ImportSite>,
    parsed: Parsed<ModModule>,
}

/// A statement that matched the plan but was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusedSite {
    /// 1-based line of the statement
    pub line: usize,
    pub reason: Refusal,
}

/// Everything a plan does to one file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileRewrite {
    /// Rendered statements, ordered by position
    pub replacements: Vec<Replacement>,
    pub refused: Vec<RefusedSite>,
}

impl FileRewrite {
    /// Whether the file stays byte-for-byte the same
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

impl SourceFile {
    /// Parse `source` and collect the import statements allowed by `nesting`
    pub fn parse(path: PathBuf, source: String, nesting: NestingPolicy) -> Result<Self, SkipReason> {
        let parsed = parse_module(&source).map_err(|err| SkipReason::Parse(err.to_string()))?;

        let mut visitor = ImportDiscoveryVisitor::new();
        visitor.visit_module(parsed.syntax());
        let imports = visitor
            .into_imports()
            .into_iter()
            .filter(|import| match nesting {
                NestingPolicy::TopLevel => import.is_module_level(),
                NestingPolicy::All => true,
            })
            .map(|import| ImportSite {
                statement: import.statement,
                range: import.range,
            })
            .collect();

        Ok(Self {
            path,
            source,
            imports,
            parsed,
        })
    }

    /// Render a statement in this file's style
    pub fn render(&self, statement: &ImportStatement) -> String {
        let stylist = Stylist::from_tokens(self.parsed.tokens(), &self.source);
        Generator::from(&stylist).stmt(&statement.to_stmt())
    }

    /// 1-based line number of `range`
    pub fn line_of(&self, range: TextRange) -> usize {
        let start = usize::from(range.start()).min(self.source.len());
        self.source.as_bytes()[..start]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }

    /// Match every import against `plan` and render the replacements
    pub fn rewrite(&self, plan: &MovePlan) -> FileRewrite {
        let rewriter = ImportRewriter::new(plan);
        let mut result = FileRewrite::default();

        for site in &self.imports {
            match rewriter.rewrite(&site.statement) {
                Rewrite::Unchanged => {}
                Rewrite::Rewritten(statement) => {
                    let text = self.render(&statement);
                    if text != self.source[site.range] {
                        result.replacements.push(Replacement::new(site.range, text));
                    }
                }
                Rewrite::Refused(reason) => {
                    let line = self.line_of(site.range);
                    warn!("{}:{}: left unchanged, {}", self.path.display(), line, reason);
                    result.refused.push(RefusedSite { line, reason });
                }
            }
        }

        result
    }
}

/// A file excluded from the rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Absolute path of the file
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Walks the repository root for source files
#[derive(Debug)]
pub struct Scanner<'a> {
    resolver: &'a ModuleResolver<'a>,
}

impl<'a> Scanner<'a> {
    /// Scan the root and configuration of `resolver`
    pub fn new(resolver: &'a ModuleResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Every source file under the root, in a stable order
    pub fn source_paths(&self) -> Vec<PathBuf> {
        let config = self.resolver.config();
        WalkDir::new(self.resolver.root())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.resolver.is_excluded(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Failed to walk directory entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && config.has_source_extension(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    /// Read and parse a single file
    pub fn load(&self, path: &Path) -> Result<SourceFile, SkipReason> {
        let source = fs::read_to_string(path).map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => SkipReason::Read("file is not valid UTF-8".to_owned()),
            _ => SkipReason::Read(err.to_string()),
        })?;
        let file = SourceFile::parse(path.to_path_buf(), source, self.resolver.config().nesting)?;
        trace!("{:?}: {} candidate imports", path, file.imports.len());
        Ok(file)
    }

    /// Load every source file lazily, one at a time.
    ///
    /// Unreadable and unparsable files are yielded as [`SkippedFile`] instead of ending the scan.
    pub fn scan(&self) -> impl Iterator<Item = Result<SourceFile, SkippedFile>> + '_ {
        self.source_paths()
            .into_iter()
            .map(|path| match self.load(&path) {
                Ok(file) => Ok(file),
                Err(reason) => {
                    warn!("Skipping {}: {}", path.display(), reason);
                    Err(SkippedFile { path, reason })
                }
            })
    }
}
