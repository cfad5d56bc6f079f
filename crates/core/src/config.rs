//! Session configuration via `keystone.toml`
//!
//! A session reads its flags from a config file in the database directory.
//! On first open a commented default file is written; edit it and reopen
//! the session to change settings.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Config file name placed in the database directory.
pub const CONFIG_FILE_NAME: &str = "keystone.toml";

/// Default polling interval of the compatibility wait mode.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// How the database is held by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Disk-backed database; updates allowed (default).
    #[default]
    Persistent,
    /// Database built in main memory; updates are rejected.
    MainMemory,
    /// Table-only main memory representation; updates are rejected.
    TableMemory,
}

impl StorageMode {
    /// Returns `true` if mutating commands may run in this mode.
    pub fn allows_updates(&self) -> bool {
        matches!(self, StorageMode::Persistent)
    }

    /// Name as written in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Persistent => "persistent",
            StorageMode::MainMemory => "main-memory",
            StorageMode::TableMemory => "table-memory",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a command waits for the resource lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockWait {
    /// Park on a condition variable until the lock is released (default).
    #[default]
    Blocking,
    /// Sleep and re-check at a fixed interval.
    Polling,
}

/// Lock wait settings, the `[lock]` table of `keystone.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    /// Wait strategy.
    #[serde(default)]
    pub wait: LockWait,
    /// Re-check interval for [`LockWait::Polling`].
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting after this many milliseconds. `None` waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl LockSettings {
    /// Polling interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Timeout as a duration, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait: LockWait::Blocking,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: None,
        }
    }
}

/// Session configuration loaded from `keystone.toml`.
///
/// # Example
///
/// ```toml
/// mode = "persistent"
/// info = false
///
/// [lock]
/// wait = "blocking"
/// poll_interval_ms = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Storage mode of the open database.
    #[serde(default)]
    pub mode: StorageMode,
    /// Record info reports in command diagnostics.
    #[serde(default)]
    pub info: bool,
    /// Lock wait settings.
    #[serde(default)]
    pub lock: LockSettings,
}

impl SessionConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Keystone session configuration
#
# Storage mode: "persistent" (default), "main-memory" or "table-memory"
#   Updating commands are rejected in the two main memory modes.
mode = "persistent"

# Record progress information in command diagnostics (default: false)
info = false

[lock]
# Lock wait strategy: "blocking" (default) or "polling"
wait = "blocking"
# Re-check interval in milliseconds when wait = "polling"
poll_interval_ms = 50
# Give up waiting for the lock after this many milliseconds (default: wait forever)
# timeout_ms = 10000
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `keystone.toml` from a database directory, creating it first if
    /// it does not exist.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }

    fn validate(&self) -> Result<()> {
        if self.lock.wait == LockWait::Polling && self.lock.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be greater than 0"));
        }
        Ok(())
    }
}
