use anyhow::{Context, Result, anyhow};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::combine::Combine;
use crate::dirs::{self, LayerSource};

/// Which import statements take part in matching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NestingPolicy {
    /// Only statements directly in the module body
    #[default]
    TopLevel,
    /// Also statements nested in functions, classes and conditional blocks
    All,
}

impl FromStr for NestingPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "top-level" => Ok(Self::TopLevel),
            "all" => Ok(Self::All),
            _ => Err(anyhow!(
                "Invalid nesting policy '{}'. Supported values: top-level, all",
                value
            )),
        }
    }
}

impl fmt::Display for NestingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopLevel => f.write_str("top-level"),
            Self::All => f.write_str("all"),
        }
    }
}

/// One configuration layer as written in a `pymove.toml` or taken from the environment.
/// Unset keys fall through to lower precedence layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// Recognised source file extensions, without the leading dot
    pub extensions: Option<Vec<String>>,

    /// Directory names that are never scanned or moved through
    pub exclude: Option<IndexSet<String>>,

    /// Whether nested import statements are rewritten too
    pub nesting: Option<NestingPolicy>,

    /// Treat directories without `__init__` as implicit namespace packages
    pub namespace_packages: Option<bool>,
}

impl Combine for Options {
    fn combine(self, other: Self) -> Self {
        Self {
            extensions: self.extensions.combine(other.extensions),
            exclude: self.exclude.combine(other.exclude),
            nesting: self.nesting.combine(other.nesting),
            namespace_packages: self.namespace_packages.combine(other.namespace_packages),
        }
    }
}

/// Resolved engine configuration, threaded explicitly through every entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Recognised source extensions; the first one is the primary extension
    pub extensions: Vec<String>,

    /// Directory names skipped while walking the repository
    pub exclude: IndexSet<String>,

    /// Statement nesting policy for matching
    pub nesting: NestingPolicy,

    /// Whether directories without an initializer count as packages
    pub namespace_packages: bool,
}

const DEFAULT_EXTENSIONS: &[&str] = &["py", "pyw"];

const DEFAULT_EXCLUDE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".virtualenv",
    "virtualenv",
    ".tox",
    ".mypy_cache",
    "node_modules",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|&s| s.to_owned()).collect(),
            exclude: DEFAULT_EXCLUDE.iter().map(|&s| s.to_owned()).collect(),
            nesting: NestingPolicy::default(),
            namespace_packages: true,
        }
    }
}

impl From<Options> for Config {
    fn from(options: Options) -> Self {
        let defaults = Self::default();
        Self {
            extensions: options
                .extensions
                .map(|exts| {
                    exts.into_iter()
                        .map(|ext| ext.trim_start_matches('.').to_owned())
                        .filter(|ext| !ext.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.extensions),
            exclude: options.exclude.unwrap_or(defaults.exclude),
            nesting: options.nesting.unwrap_or(defaults.nesting),
            namespace_packages: options
                .namespace_packages
                .unwrap_or(defaults.namespace_packages),
        }
    }
}

/// Configuration values from environment variables with PYMOVE_ prefix
#[derive(Debug, Clone, Default)]
pub struct EnvConfig;

impl EnvConfig {
    /// Load a configuration layer from `PYMOVE_*` environment variables
    pub fn from_env() -> Options {
        let mut options = Options::default();

        // PYMOVE_EXTENSIONS - comma-separated list of extensions
        if let Ok(value) = env::var("PYMOVE_EXTENSIONS") {
            let extensions: Vec<String> = split_list(&value).collect();
            if !extensions.is_empty() {
                options.extensions = Some(extensions);
            }
        }

        // PYMOVE_EXCLUDE - comma-separated list of directory names
        if let Ok(value) = env::var("PYMOVE_EXCLUDE") {
            let exclude: IndexSet<String> = split_list(&value).collect();
            if !exclude.is_empty() {
                options.exclude = Some(exclude);
            }
        }

        if let Ok(value) = env::var("PYMOVE_NESTING") {
            match value.trim().parse() {
                Ok(policy) => options.nesting = Some(policy),
                Err(err) => log::warn!("Ignoring PYMOVE_NESTING: {err}"),
            }
        }

        if let Ok(value) = env::var("PYMOVE_NAMESPACE_PACKAGES") {
            options.namespace_packages = parse_bool(&value);
        }

        options
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Parse a boolean value from string, supporting various common formats
fn parse_bool(value: &str) -> Option<bool> {
    use cow_utils::CowUtils;
    match value.cow_to_lowercase().as_ref() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Extension used when a module path is turned back into a file path
    pub fn primary_extension(&self) -> &str {
        self.extensions.first().map_or("py", String::as_str)
    }

    /// Whether `path` carries one of the recognised source extensions
    pub fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    /// Whether a directory with this file name must not be walked into
    pub fn is_excluded_dir(&self, name: &OsStr) -> bool {
        name.to_str().is_some_and(|name| self.exclude.contains(name))
    }

    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Options> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let options: Options = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(options)
    }

    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (PYMOVE_*)
    /// 3. Project config (pymove.toml in the repository root)
    /// 4. User config (~/.config/pymove/pymove.toml)
    /// 5. System config (/etc/pymove/pymove.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(repo_root: &Path, cli_config_path: Option<&Path>) -> Result<Self> {
        let mut options = Options::default();
        let mut env_applied = false;

        for layer in dirs::config_layers(repo_root, cli_config_path) {
            if layer.source != LayerSource::Cli && !env_applied {
                options = options.combine(EnvConfig::from_env());
                env_applied = true;
            }
            if layer.source == LayerSource::Cli && !layer.path.exists() {
                return Err(anyhow!("Config file not found: {:?}", layer.path));
            }
            log::debug!("Loading {} from: {:?}", layer.source, layer.path);
            let layer_options = Self::load_from_file(&layer.path)
                .with_context(|| format!("Failed to load {} from {:?}", layer.source, layer.path))?;
            options = options.combine(layer_options);
        }
        if !env_applied {
            options = options.combine(EnvConfig::from_env());
        }

        let config = Self::from(options);
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(anyhow!("At least one source extension must be configured"));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.contains(['.', '/', '\\']))
        {
            return Err(anyhow!("Invalid source extension '{}'", bad));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::CONFIG_FILE;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    struct EnvGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = env::var(key).ok();
            // SAFETY: tests touching the environment run serially
            unsafe {
                env::set_var(key, value);
            }
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: tests touching the environment run serially
            unsafe {
                match self.original.take() {
                    Some(original) => env::set_var(self.key, original),
                    None => env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.primary_extension(), "py");
        assert!(config.has_source_extension(Path::new("pkg/mod.pyw")));
        assert!(!config.has_source_extension(Path::new("pkg/mod.pyc")));
        assert!(config.is_excluded_dir(OsStr::new(".venv")));
        assert_eq!(config.nesting, NestingPolicy::TopLevel);
        assert!(config.namespace_packages);
    }

    #[test]
    fn test_options_from_toml() -> Result<()> {
        let options: Options = toml::from_str(
            r#"
extensions = [".py"]
exclude = ["build"]
nesting = "all"
namespace-packages = false
"#,
        )?;
        let config = Config::from(options);
        assert_eq!(config.extensions, vec!["py".to_owned()]);
        assert!(config.is_excluded_dir(OsStr::new("build")));
        assert!(!config.is_excluded_dir(OsStr::new(".git")));
        assert_eq!(config.nesting, NestingPolicy::All);
        assert!(!config.namespace_packages);
        Ok(())
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result: std::result::Result<Options, _> = toml::from_str("target-version = \"py310\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_nesting_policy_from_str() {
        assert_eq!("all".parse::<NestingPolicy>().ok(), Some(NestingPolicy::All));
        assert_eq!(
            "top-level".parse::<NestingPolicy>().ok(),
            Some(NestingPolicy::TopLevel)
        );
        assert!("nested".parse::<NestingPolicy>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_validate_rejects_bad_extension() {
        let config = Config {
            extensions: vec!["py/x".to_owned()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            extensions: Vec::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_project_config() -> Result<()> {
        let repo = TempDir::new()?;
        fs::write(
            repo.path().join(CONFIG_FILE),
            "nesting = \"all\"\nnamespace-packages = false\n",
        )?;

        let _nesting = EnvGuard::set("PYMOVE_NESTING", "top-level");
        let config = Config::load(repo.path(), None)?;

        assert_eq!(config.nesting, NestingPolicy::TopLevel);
        assert!(!config.namespace_packages);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_cli_config_has_highest_precedence() -> Result<()> {
        let repo = TempDir::new()?;
        fs::write(repo.path().join(CONFIG_FILE), "extensions = [\"py\"]\n")?;
        let cli_config = repo.path().join("custom.toml");
        fs::write(&cli_config, "extensions = [\"pyi\"]\n")?;

        let _extensions = EnvGuard::set("PYMOVE_EXTENSIONS", "pyw");
        let config = Config::load(repo.path(), Some(&cli_config))?;

        assert_eq!(config.primary_extension(), "pyi");
        assert_eq!(
            config.extensions,
            vec!["pyi".to_owned(), "pyw".to_owned(), "py".to_owned()]
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn test_missing_cli_config_is_an_error() {
        let repo = TempDir::new().expect("temp dir");
        let missing = repo.path().join("missing.toml");
        assert!(Config::load(repo.path(), Some(&missing)).is_err());
    }
}
