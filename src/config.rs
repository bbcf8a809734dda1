use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::category::Category;
use crate::error::GhSyncError;

/// Settings file for ghsync. Every field is optional; command-line flags and
/// the `GHSYNC_DIR` environment variable take precedence.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Root of the category tree when neither `--root` nor `GHSYNC_DIR` is set
    #[serde(default)]
    pub root_directory: Option<String>,

    /// GitHub authentication settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "git_config", "gh_cli", "token"

    /// GitHub username (read from `git config github.user` if null)
    pub username: Option<String>,

    /// API base URL, for GitHub Enterprise
    pub api_url: Option<String>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum parallel git operations within a category
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Timeout for git operations in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fast-forward only pulls
    #[serde(default)]
    pub fast_forward_only: bool,

    /// Add an `upstream` remote to forks without passing --upstream
    #[serde(default)]
    pub upstream: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    4
}
fn default_timeout() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            username: None,
            api_url: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            timeout: default_timeout(),
            fast_forward_only: false,
            upstream: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if there is
    /// no file there
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GhSyncError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut config: Config = serde_yaml::from_str(&content).map_err(|e| {
            GhSyncError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("ghsync").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(root) = &self.root_directory {
            let expanded = shellexpand::full(root)
                .map_err(|e| GhSyncError::Config(format!("Failed to expand root_directory: {}", e)))?
                .into_owned();
            self.root_directory = Some(expanded);
        }

        Ok(())
    }

    /// Resolve the root of the category tree: explicit value (flag or
    /// `GHSYNC_DIR`), then the config file, then the current directory. The
    /// result is always absolute.
    pub fn resolve_root(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let root = match (explicit, &self.root_directory) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(configured)) => PathBuf::from(configured),
            (None, None) => PathBuf::from("."),
        };

        if root.is_absolute() {
            Ok(root)
        } else {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Ok(cwd.join(root))
        }
    }
}

/// Everything a run needs, resolved once at startup and read-only after
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Organization to sync; `None` syncs the account's own repositories
    /// plus its watch list
    pub scope: Option<String>,

    /// Absolute root of the category tree
    pub root: PathBuf,

    /// Add an `upstream` remote to forks
    pub upstream: bool,

    /// Categories to process; `None` processes all of them
    pub only: Option<Vec<Category>>,

    /// Print planned actions without touching the filesystem
    pub dry_run: bool,

    /// Maximum concurrent git operations within a category
    pub max_parallel: usize,

    /// Bound on each git subprocess
    pub timeout: Duration,

    pub fast_forward_only: bool,
}

impl RunConfig {
    /// Build a run configuration with settings from the config file
    pub fn from_config(config: &Config, root: PathBuf) -> Self {
        Self {
            scope: None,
            root,
            upstream: config.sync.upstream,
            only: None,
            dry_run: false,
            max_parallel: config.sync.max_parallel.max(1),
            timeout: Duration::from_secs(config.sync.timeout),
            fast_forward_only: config.sync.fast_forward_only,
        }
    }

    /// Whether the category filter lets `category` through
    pub fn includes(&self, category: Category) -> bool {
        self.only
            .as_ref()
            .map_or(true, |only| only.contains(&category))
    }

    /// The watch list is only synced for the account itself
    pub fn includes_watched(&self) -> bool {
        self.scope.is_none() && self.includes(Category::Watched)
    }
}
