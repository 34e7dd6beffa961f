//! Configuration loading, defaults, and validation for idlecat.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Thresholds;

/// Default silence (seconds) before an active stream is reclassified idle.
pub const DEFAULT_IDLE_TIMEOUT: u64 = 5;

/// Default minimum idle dwell (seconds) before the idle-to-active hook fires.
pub const DEFAULT_IDLE_TO_ACTIVE_THRESHOLD: u64 = 2 * 60;

/// Default minimum active dwell (seconds) before the active-to-idle hook fires.
pub const DEFAULT_ACTIVE_TO_IDLE_THRESHOLD: u64 = 3 * 60;

/// Configuration rejected at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Idle timeout must be positive")]
    ZeroIdleTimeout,

    #[error("Idle to active threshold must be positive")]
    ZeroIdleToActiveThreshold,

    #[error("Active to idle threshold must be positive")]
    ZeroActiveToIdleThreshold,
}

/// Main configuration for idlecat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds of silence before an active stream goes idle (default: 5).
    pub idle_timeout_seconds: u64,

    /// Minimum seconds spent idle before the idle-to-active hook is invoked
    /// (default: 120).
    pub idle_to_active_threshold_seconds: u64,

    /// Minimum seconds spent active before the active-to-idle hook is invoked
    /// (default: 180).
    pub active_to_idle_threshold_seconds: u64,

    /// Shell command to run on an idle-to-active transition.
    pub on_active_command: Option<String>,

    /// Shell command to run on an active-to-idle transition.
    pub on_idle_command: Option<String>,

    /// Shell command to run when the input reaches end-of-stream.
    pub on_eof_command: Option<String>,

    /// Dry run mode: log hook commands instead of executing them.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT,
            idle_to_active_threshold_seconds: DEFAULT_IDLE_TO_ACTIVE_THRESHOLD,
            active_to_idle_threshold_seconds: DEFAULT_ACTIVE_TO_IDLE_THRESHOLD,
            on_active_command: None,
            on_idle_command: None,
            on_eof_command: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("idlecat").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Reject non-positive timing values before any I/O begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_seconds == 0 {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        if self.idle_to_active_threshold_seconds == 0 {
            return Err(ConfigError::ZeroIdleToActiveThreshold);
        }
        if self.active_to_idle_threshold_seconds == 0 {
            return Err(ConfigError::ZeroActiveToIdleThreshold);
        }
        Ok(())
    }

    /// Timing configuration for the state machine.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            idle_timeout: Duration::from_secs(self.idle_timeout_seconds),
            idle_to_active: Duration::from_secs(self.idle_to_active_threshold_seconds),
            active_to_idle: Duration::from_secs(self.active_to_idle_threshold_seconds),
        }
    }
}
