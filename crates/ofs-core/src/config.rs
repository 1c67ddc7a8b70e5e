//! Engine configuration.
//!
//! Resolution order for the config file:
//! 1. Explicit `--config` path
//! 2. `OFS_CONFIG` environment variable
//! 3. XDG config directory (`~/.config/open-file-search/config.toml`)
//! 4. System config (`/etc/open-file-search/config.toml`)
//! 5. Built-in defaults
//!
//! An explicit path (CLI or environment) must exist; the discovered
//! locations are skipped when absent.

use ofs_common::{ErrorCategory, StructuredError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::buffer::DEFAULT_CAPACITY;

/// Environment variable naming a config file.
pub const ENV_CONFIG_PATH: &str = "OFS_CONFIG";

/// Application name for XDG and /etc directories.
const APP_NAME: &str = "open-file-search";

const CONFIG_FILENAME: &str = "config.toml";

/// Largest accepted buffer capacity.
pub const MAX_CAPACITY: usize = 65_536;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code (40-49, next to the control channel codes).
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Read { .. } => 40,
            ConfigError::Parse { .. } => 41,
            ConfigError::Invalid(_) => 42,
        }
    }

    pub fn headline(&self) -> &'static str {
        "Configuration Error"
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => {
                "Check the path given by --config or OFS_CONFIG, or unset it to use the defaults."
            }
            ConfigError::Parse { .. } => "Fix the TOML syntax in the config file.",
            ConfigError::Invalid(_) => {
                "Set capacity between 1 and 65536 and a non-empty proc_root."
            }
        }
    }
}

impl From<&ConfigError> for StructuredError {
    fn from(err: &ConfigError) -> Self {
        StructuredError {
            code: err.code(),
            category: ErrorCategory::Config,
            message: err.to_string(),
            recoverable: true,
            remediation: err.remediation().to_string(),
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    Environment,
    XdgConfig,
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Tunables of one search instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Records one query can collect.
    pub capacity: usize,
    /// Mount point of the proc filesystem.
    pub proc_root: PathBuf,
    /// Stop visiting processes after this many milliseconds. Off when unset.
    pub scan_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            proc_root: PathBuf::from("/proc"),
            scan_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<string>"))
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(ConfigError::Invalid(format!(
                "capacity must be between 1 and {MAX_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.proc_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("proc_root must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scan_budget(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }
}

/// A configuration together with where it was found.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
}

/// Resolve and load the configuration using the standard order.
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let env_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
    let (path, source) = resolve_config_path(
        cli_path,
        env_path.as_deref(),
        xdg_config_dir().as_deref(),
        &system_config_dir(),
    );

    let config = match &path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    tracing::debug!(source = %source, path = ?path, "configuration resolved");
    Ok(LoadedConfig {
        config,
        source,
        path,
    })
}

/// Pick the config file to load, if any.
pub fn resolve_config_path(
    cli_path: Option<&Path>,
    env_path: Option<&Path>,
    xdg_dir: Option<&Path>,
    system_dir: &Path,
) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return (Some(path.to_path_buf()), ConfigSource::Environment);
    }

    if let Some(path) = xdg_dir.map(|dir| dir.join(CONFIG_FILENAME)) {
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    let system_path = system_dir.join(CONFIG_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// XDG config directory for open-file-search.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// System config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
