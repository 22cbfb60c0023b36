//! Where configuration files are looked up.
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;

/// Directory name used below the user and system configuration roots
const CONFIG_DIR: &str = "pymove";

/// Configuration file name, also looked up at the repository root
pub const CONFIG_FILE: &str = "pymove.toml";

/// Origin of a file-backed configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSource {
    /// `--config` on the command line
    Cli,
    /// `pymove.toml` in the repository root
    Project,
    /// `<user config dir>/pymove/pymove.toml`
    User,
    /// `XDG_CONFIG_DIRS`, `/etc/pymove` or `%SYSTEMDRIVE%\ProgramData\pymove`
    System,
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cli => "CLI config",
            Self::Project => "project config",
            Self::User => "user config",
            Self::System => "system config",
        })
    }
}

/// A configuration file to merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Where the file was found
    pub source: LayerSource,
    /// The file itself
    pub path: PathBuf,
}

/// File-backed configuration layers for `repo_root`, highest precedence first.
///
/// The CLI path is returned whether or not it exists so the caller can reject it; every other
/// layer is only returned when its file exists.
pub fn config_layers(repo_root: &Path, cli_config: Option<&Path>) -> Vec<ConfigLayer> {
    let mut layers = Vec::new();
    if let Some(path) = cli_config {
        layers.push(ConfigLayer {
            source: LayerSource::Cli,
            path: path.to_path_buf(),
        });
    }

    let discovered = [
        (LayerSource::Project, Some(repo_root.join(CONFIG_FILE))),
        (LayerSource::User, user_config_file()),
        (
            LayerSource::System,
            system_candidates().into_iter().find(|path| path.is_file()),
        ),
    ];
    layers.extend(
        discovered
            .into_iter()
            .filter_map(|(source, path)| Some((source, path?)))
            .filter(|(_, path)| path.is_file())
            .map(|(source, path)| ConfigLayer { source, path }),
    );
    layers
}

fn user_config_file() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join(CONFIG_DIR).join(CONFIG_FILE))
}

/// System-wide candidates in lookup order
fn system_candidates() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        env::var_os("SYSTEMDRIVE")
            .map(|drive| windows_candidate(Path::new(&drive)))
            .into_iter()
            .collect()
    }

    #[cfg(not(windows))]
    {
        let mut candidates = xdg_candidates(env::var("XDG_CONFIG_DIRS").ok().as_deref());
        candidates.push(Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE));
        candidates
    }
}

/// One candidate per entry of `XDG_CONFIG_DIRS`, `/etc/xdg` when unset or empty
#[cfg(not(windows))]
fn xdg_candidates(config_dirs: Option<&str>) -> Vec<PathBuf> {
    config_dirs
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or("/etc/xdg")
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(CONFIG_DIR).join(CONFIG_FILE))
        .collect()
}

#[cfg(windows)]
fn windows_candidate(system_drive: &Path) -> PathBuf {
    system_drive
        .join("ProgramData")
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}
