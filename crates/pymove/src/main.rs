use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::path::{Path, PathBuf, is_separator};

use pymove::config::Config;
use pymove::move_plan::{MoveKind, MovePlan};
use pymove::mover::FsMover;
use pymove::orchestrator::{ApplyReport, MoveOrchestrator};
use pymove::util::display_relative;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository root that module paths are computed from
    #[arg(long, default_value = ".", global = true)]
    repo_root: PathBuf,

    /// Compute the rewrites without moving or writing anything
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Move a single source file
    MoveFile { source: PathBuf, destination: PathBuf },
    /// Move a package directory
    MoveFolder { source: PathBuf, destination: PathBuf },
    /// Move a file or directory
    Move { source: PathBuf, destination: PathBuf },
    /// Rewrite imports for a move that already happened
    Rewrite { old: PathBuf, new: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = match cli.verbose {
        0 => "warn",  // Default: warnings and errors only
        1 => "info",  // -v: informational messages
        2 => "debug", // -vv: debug messages
        _ => "trace", // -vvv or more: trace messages
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );

    let repo_root = std::path::absolute(&cli.repo_root)?;
    let config = Config::load(&repo_root, cli.config.as_deref())?;
    debug!("Configuration: {:?}", config);

    let orchestrator = MoveOrchestrator::new(config, &repo_root).with_dry_run(cli.dry_run);
    if orchestrator.is_dry_run() {
        info!("Dry run: nothing will be moved or written");
    }

    let (plan, report) = match &cli.command {
        Command::MoveFile {
            source,
            destination,
        } => relocate(&orchestrator, source, destination, Some(MoveKind::File))?,
        Command::MoveFolder {
            source,
            destination,
        } => relocate(&orchestrator, source, destination, Some(MoveKind::Directory))?,
        Command::Move {
            source,
            destination,
        } => relocate(&orchestrator, source, destination, None)?,
        Command::Rewrite { old, new } => {
            let plan = orchestrator.plan_completed_move(old, new)?;
            let report = orchestrator.apply_plan(&plan);
            (plan, report)
        }
    };

    print_summary(&repo_root, &plan, &report, orchestrator.is_dry_run());
    Ok(())
}

fn relocate(
    orchestrator: &MoveOrchestrator,
    source: &Path,
    destination: &Path,
    expected: Option<MoveKind>,
) -> anyhow::Result<(MovePlan, ApplyReport)> {
    let destination = into_directory(source, destination);
    Ok(orchestrator.relocate(source, &destination, expected, &FsMover)?)
}

/// `dst/` means "into dst", even when dst does not exist yet
fn into_directory(source: &Path, destination: &Path) -> PathBuf {
    let raw = destination.as_os_str().to_string_lossy();
    match source.file_name() {
        Some(name) if raw.ends_with(is_separator) => destination.join(name),
        _ => destination.to_path_buf(),
    }
}

fn print_summary(root: &Path, plan: &MovePlan, report: &ApplyReport, dry_run: bool) {
    println!(
        "{} modules moved, {} files {}",
        plan.len(),
        report.files_changed,
        if dry_run { "would change" } else { "changed" }
    );
    for path in &report.changed_paths {
        println!("  {}", display_relative(root, path));
    }
    if !report.files_skipped.is_empty() {
        println!("{} files skipped:", report.files_skipped.len());
        for skipped in &report.files_skipped {
            println!("  {}: {}", display_relative(root, &skipped.path), skipped.reason);
        }
    }
    if !report.statements_refused.is_empty() {
        println!("{} imports left unchanged:", report.statements_refused.len());
        for refused in &report.statements_refused {
            println!(
                "  {}:{}: {}",
                display_relative(root, &refused.path),
                refused.line,
                refused.reason
            );
        }
    }
}
