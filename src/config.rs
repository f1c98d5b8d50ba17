use anyhow::{bail, Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::repo::{RepositorySpec, TrackingMode, DEFAULT_GIT_BINARY};

/// Branch value that selects tag tracking instead of a branch
pub const LATEST_TAG: &str = "{latest}";

/// Main configuration structure for syncwarden
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base directory that relative repository paths are resolved against
    #[serde(default)]
    pub root: Option<String>,

    /// Program used for git invocations
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Repositories to keep in sync, in order
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// One repository entry as written in the config file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RepositoryConfig {
    /// Remote location, may embed credentials
    #[serde(default)]
    pub url: String,

    /// Local directory; relative paths are joined onto `root`
    #[serde(default)]
    pub path: Option<String>,

    /// Branch to pull, or "{latest}" to follow the newest tag
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Interval between pulls ("30s", "5m", "1h", "1d" or bare seconds)
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Extra arguments for git clone
    #[serde(default)]
    pub clone_args: Vec<String>,

    /// Extra arguments for git pull
    #[serde(default)]
    pub pull_args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact" or "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_git_binary() -> String {
    DEFAULT_GIT_BINARY.to_string()
}
fn default_branch() -> String {
    "master".to_string()
}
fn default_interval() -> String {
    "1h".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            git_binary: default_git_binary(),
            logging: LoggingConfig::default(),
            repositories: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Load from the given path, or from the default location when none is given
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_config_path()?;
                if !path.exists() {
                    bail!(
                        "No configuration found at {:?}; see config.example.yml",
                        path
                    );
                }
                Self::load(&path)
            }
        }
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("syncwarden").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(root) = &self.root {
            self.root = Some(
                shellexpand::full(root)
                    .context("Failed to expand root path")?
                    .into_owned(),
            );
        }

        for repo in &mut self.repositories {
            if let Some(path) = &repo.path {
                repo.path = Some(
                    shellexpand::full(path)
                        .with_context(|| format!("Failed to expand path for {}", repo.url))?
                        .into_owned(),
                );
            }
        }

        Ok(())
    }

    /// Resolve a repository path: absolute paths are kept, relative ones are
    /// joined onto `root`, and a missing path falls back to `root` itself.
    pub fn resolve_path(&self, path: Option<&str>) -> Option<PathBuf> {
        let root = self.root.as_deref().filter(|r| !r.is_empty()).map(PathBuf::from);

        let resolved = match (path.filter(|p| !p.is_empty()), root) {
            (Some(p), _) if Path::new(p).is_absolute() => PathBuf::from(p),
            (Some(p), Some(root)) => root.join(p),
            (Some(p), None) => std::env::current_dir().ok()?.join(p),
            (None, Some(root)) => root,
            (None, None) => return None,
        };

        Some(resolved.clean())
    }

    /// Build the validated, ordered list of repository specifications
    pub fn repository_specs(&self) -> Result<Vec<RepositorySpec>> {
        if self.repositories.is_empty() {
            bail!("No repositories configured");
        }

        self.repositories
            .iter()
            .enumerate()
            .map(|(i, repo)| {
                self.repository_spec(repo)
                    .with_context(|| format!("Invalid repository #{}", i + 1))
            })
            .collect()
    }

    fn repository_spec(&self, repo: &RepositoryConfig) -> Result<RepositorySpec> {
        let path = self.resolve_path(repo.path.as_deref()).unwrap_or_default();
        let interval = parse_duration(&repo.interval)?;

        let spec = RepositorySpec::new(repo.url.clone(), path, tracking_mode(&repo.branch))?
            .with_interval(interval)
            .with_clone_args(repo.clone_args.clone())
            .with_pull_args(repo.pull_args.clone());

        Ok(spec)
    }
}

/// Translate the configured branch into a tracking mode
pub fn tracking_mode(branch: &str) -> TrackingMode {
    match branch.trim() {
        LATEST_TAG => TrackingMode::LatestTag,
        "" => TrackingMode::Branch(default_branch()),
        name => TrackingMode::Branch(name.to_string()),
    }
}

/// Parse duration strings like "30s", "5m", "1h", "2d" or raw seconds.
///
/// An empty string or zero yields `Duration::ZERO`, which repository specs
/// treat as "use the default interval".
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    if duration_str.is_empty() {
        return Ok(Duration::ZERO);
    }

    let scaled = |value: &str, unit: u64, what: &str| -> Result<u64> {
        let value = value
            .parse::<u64>()
            .with_context(|| format!("Invalid {} value", what))?;
        value
            .checked_mul(unit)
            .with_context(|| format!("Interval too large: {}", duration_str))
    };

    let secs = if let Some(value) = duration_str.strip_suffix('s') {
        scaled(value, 1, "seconds")?
    } else if let Some(value) = duration_str.strip_suffix('m') {
        scaled(value, 60, "minutes")?
    } else if let Some(value) = duration_str.strip_suffix('h') {
        scaled(value, 3600, "hours")?
    } else if let Some(value) = duration_str.strip_suffix('d') {
        scaled(value, 86400, "days")?
    } else {
        // Try to parse as raw seconds
        duration_str
            .parse::<u64>()
            .context("Invalid duration format. Use format like '30s', '5m', '1h'")?
    };

    Ok(Duration::from_secs(secs))
}
