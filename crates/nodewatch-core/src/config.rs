//! Configuration management for nodewatch

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::StatusThresholds;

/// Environment variable prefix, e.g. `NODEWATCH_API__BASE_URL`
const ENV_PREFIX: &str = "NODEWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration
    pub api: ApiConfig,

    /// Operator session configuration
    pub session: SessionConfig,

    /// Polling configuration
    pub poll: PollConfig,

    /// Severity thresholds
    pub status: StatusThresholds,

    /// Local state storage configuration
    pub storage: StorageConfig,

    /// TUI configuration
    pub tui: TuiConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend REST API
    pub base_url: String,
    /// Bearer token, if the backend requires one
    pub token: Option<String>,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Operator session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend user id of the operator running this client
    pub user_id: Option<i64>,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Interval between alert refresh cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

/// Local state storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted client state; platform data dir when unset
    pub dir: Option<PathBuf>,
    /// Maximum number of seen-alert fingerprints kept per user
    pub seen_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            seen_capacity: 1000,
        }
    }
}

/// TUI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiConfig {
    /// How long a toast stays on screen
    #[serde(with = "humantime_serde")]
    pub toast_ttl: Duration,
    /// Maximum number of toasts kept on screen
    pub toast_limit: usize,
    /// Number of entries shown in the notification panel
    pub panel_limit: usize,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            toast_ttl: Duration::from_secs(6),
            toast_limit: 10,
            panel_limit: 15,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
    /// Log directory for dashboard mode; platform data dir when unset
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            dir: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and environment
    ///
    /// An explicit path must exist; the default file under the platform
    /// config directory is optional. `NODEWATCH_*` variables win over both.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = explicit_path {
            builder = builder.add_source(config::File::from(path));
        } else if let Some(path) = Self::default_file() {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Default config file location, e.g. `~/.config/nodewatch/nodewatch.toml`
    pub fn default_file() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("nodewatch.toml"))
    }

    /// Directory for persisted client state
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("state"))
            .ok_or_else(|| Error::config("no home directory; set storage.dir explicitly"))
    }

    /// Directory for dashboard-mode log files
    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.logging.dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("logs"))
            .ok_or_else(|| Error::config("no home directory; set logging.dir explicitly"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "nodewatch")
}
