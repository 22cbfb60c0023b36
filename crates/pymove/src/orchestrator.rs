use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{MoveError, Result, SkipReason};
use crate::import_rewriter::Refusal;
use crate::move_plan::{MoveKind, MovePlan, MoveRequest};
use crate::mover::FileMover;
use crate::resolver::ModuleResolver;
use crate::scanner::{Scanner, SkippedFile};
use crate::util::display_relative;
use crate::writer;

/// A matching statement that was deliberately left unmodified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusedImport {
    /// File containing the statement
    pub path: PathBuf,
    /// 1-based line of the statement
    pub line: usize,
    pub reason: Refusal,
}

/// Summary of one rewrite pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Files rewritten (or that would be, in a dry run)
    pub files_changed: usize,
    /// Paths of those files, in scan order
    pub changed_paths: Vec<PathBuf>,
    /// Files that could not be read, parsed or saved
    pub files_skipped: Vec<SkippedFile>,
    /// Matching statements left as they were
    pub statements_refused: Vec<RefusedImport>,
}

/// Drives planning, the physical move and the rewrite pass for one repository
#[derive(Debug)]
pub struct MoveOrchestrator {
    config: Config,
    root: PathBuf,
    dry_run: bool,
}

impl MoveOrchestrator {
    /// Work on the repository at `root`, which must already be absolute
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            dry_run: false,
        }
    }

    /// Compute everything but never touch the filesystem
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether this orchestrator leaves the filesystem alone
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Path and module mapping for this repository
    pub fn resolver(&self) -> ModuleResolver<'_> {
        ModuleResolver::new(&self.root, &self.config)
    }

    /// Plan a move that has not happened yet
    pub fn plan_move(&self, old_path: &Path, new_path: &Path) -> Result<MovePlan> {
        MovePlan::build(old_path, new_path, &self.resolver())
    }

    /// Plan a move that already happened on disk
    pub fn plan_completed_move(&self, old_path: &Path, new_path: &Path) -> Result<MovePlan> {
        MovePlan::build_after_move(old_path, new_path, &self.resolver())
    }

    /// Rewrite every source file under the root according to `plan`
    pub fn apply_plan(&self, plan: &MovePlan) -> ApplyReport {
        let resolver = self.resolver();
        let scanner = Scanner::new(&resolver);
        let mut report = ApplyReport::default();

        if plan.is_empty() {
            info!("Nothing to rewrite: the move plan is empty");
            return report;
        }

        info!("Scanning {}", resolver.root().display());

        // one file in memory at a time
        for file in scanner.scan() {
            let file = match file {
                Ok(file) => file,
                Err(skipped) => {
                    report.files_skipped.push(skipped);
                    continue;
                }
            };
            let path = file.path.clone();

            let rewrite = file.rewrite(plan);
            report
                .statements_refused
                .extend(rewrite.refused.into_iter().map(|refused| RefusedImport {
                    path: path.clone(),
                    line: refused.line,
                    reason: refused.reason,
                }));
            if rewrite.is_empty() {
                continue;
            }

            if self.dry_run {
                debug!(
                    "Would rewrite {} statement(s) in {}",
                    rewrite.replacements.len(),
                    display_relative(resolver.root(), &path)
                );
            } else if let Err(reason) = writer::write_file(&path, &file.source, &rewrite.replacements) {
                warn!("Failed to save {}: {}", display_relative(resolver.root(), &path), reason);
                report.files_skipped.push(SkippedFile { path, reason });
                continue;
            }
            report.files_changed += 1;
            report.changed_paths.push(path);
        }

        info!(
            "{} {} files, skipped {}, left {} statements unchanged",
            if self.dry_run { "Would rewrite" } else { "Rewrote" },
            report.files_changed,
            report.files_skipped.len(),
            report.statements_refused.len()
        );
        report
    }

    /// Move `old_path` to `new_path` and rewrite the imports that reference it.
    ///
    /// With `expected` set, the source must be of that kind. The plan is built before anything is
    /// moved; a failed move leaves every file untouched.
    pub fn relocate(
        &self,
        old_path: &Path,
        new_path: &Path,
        expected: Option<MoveKind>,
        mover: &dyn FileMover,
    ) -> Result<(MovePlan, ApplyReport)> {
        let resolver = self.resolver();
        let request = MoveRequest::resolve(old_path, new_path, &resolver)?;
        match (expected, request.kind) {
            (Some(MoveKind::File), MoveKind::Directory) => {
                return Err(MoveError::invalid(&request.source, "expected a file, found a directory"));
            }
            (Some(MoveKind::Directory), MoveKind::File) => {
                return Err(MoveError::invalid(&request.source, "expected a directory, found a file"));
            }
            _ => {}
        }

        let plan = MovePlan::for_request(&request, &resolver)?;
        info!(
            "Moving {} to {} ({} modules affected)",
            display_relative(resolver.root(), &request.source),
            display_relative(resolver.root(), &request.destination),
            plan.len()
        );

        if self.dry_run {
            debug!("Dry run: not moving {:?}", request.source);
        } else {
            mover.move_path(&request.source, &request.destination)?;
        }

        let report = self.apply_plan(&plan);
        Ok((plan, report))
    }
}

impl ApplyReport {
    /// Skipped files whose syntax could not be parsed
    pub fn parse_failures(&self) -> impl Iterator<Item = &SkippedFile> {
        self.files_skipped
            .iter()
            .filter(|skipped| matches!(skipped.reason, SkipReason::Parse(_)))
    }
}
