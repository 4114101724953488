//! Configuration for the analytics engine.

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DEVPULSE_DATA_DIR";

/// Top-level configuration, stored as `config.toml` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Event store location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Version-control command execution.
    #[serde(default)]
    pub git: GitConfig,

    /// AI-assisted commit detection.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Outbound event sync.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from `config.toml` under `data_dir`.
    ///
    /// A missing file yields the defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| PulseError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| PulseError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `config.toml` under `data_dir`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| PulseError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| PulseError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Resolves the data directory: `DEVPULSE_DATA_DIR`, else `~/.devpulse`.
    pub fn default_data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".devpulse"))
            .ok_or_else(|| PulseError::Config("cannot determine home directory".to_string()))
    }

    /// Absolute path of the event store for `data_dir`.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.store_file)
    }

    /// Absolute path of the sync outbox for `data_dir`.
    pub fn outbox_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.sync.outbox)
    }
}

/// Event store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store file name relative to the data directory (default: "usage.redb").
    pub store_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_file: "usage.redb".to_string(),
        }
    }
}

/// Version-control command configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Executable to invoke (default: "git").
    pub binary: String,

    /// Working tree to inspect (default: current directory).
    pub repo_path: PathBuf,

    /// Per-command timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
            repo_path: PathBuf::from("."),
            timeout_secs: 30,
        }
    }
}

impl GitConfig {
    /// Returns the command timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Commit classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassifierConfig {
    /// Keywords appended to the built-in AI tool list (matched lowercase).
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

/// Outbound sync queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Forward appended events to the collector (default: false).
    pub enabled: bool,

    /// Maximum number of queued events before new ones are dropped (default: 256).
    pub queue_capacity: usize,

    /// Delivery attempts after the first failure (default: 3).
    pub max_retries: u32,

    /// Base backoff between attempts in milliseconds (default: 200).
    pub retry_backoff_ms: u64,

    /// Outbox file name relative to the data directory.
    pub outbox: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: 256,
            max_retries: 3,
            retry_backoff_ms: 200,
            outbox: "outbox.jsonl".to_string(),
        }
    }
}

impl SyncConfig {
    /// Returns the retry backoff as a Duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
