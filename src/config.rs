//! Configuration loading and persistence.
//!
//! `Config` is built once by the binary and handed down in an `Arc` to the
//! session, its script runner and the delivery loop. Nothing reads it from a
//! global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants;

/// Configuration for scriptcast.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Largest serialized message delivered to the client, in megabytes.
    pub max_message_size_mb: u64,
    /// Rerun the script when its source file changes.
    pub run_on_save: bool,
    /// How often the delivery loop flushes the outgoing queue, in milliseconds.
    pub flush_interval_ms: u64,
    /// How long a session shutdown waits for the script runner, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Show exception messages and traces to the client. When false the
    /// client gets a generic notice and the details only go to the log.
    pub show_error_details: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_size_mb: constants::DEFAULT_MAX_MESSAGE_SIZE_MB,
            run_on_save: true,
            flush_interval_ms: constants::DEFAULT_FLUSH_INTERVAL_MS,
            shutdown_timeout_secs: constants::DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            show_error_details: true,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/scriptcast-test`
    /// 2. `SCRIPTCAST_CONFIG_DIR` env var: explicit override
    /// 3. Default: platform config dir (Linux: ~/.config/scriptcast)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                // Unit tests: use the repo's tmp/ directory
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/scriptcast-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(dir) = std::env::var(constants::ENV_CONFIG_DIR) {
                    PathBuf::from(dir)
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join(constants::APP_NAME)
                }
            }
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to the defaults.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default config: {e:#}");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join(constants::CONFIG_FILE_NAME);
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(mb) = env_parse::<u64>(constants::ENV_MAX_MESSAGE_SIZE_MB) {
            self.max_message_size_mb = mb;
        }

        if let Some(run_on_save) = env_flag(constants::ENV_RUN_ON_SAVE) {
            self.run_on_save = run_on_save;
        }

        if let Some(ms) = env_parse::<u64>(constants::ENV_FLUSH_INTERVAL_MS) {
            self.flush_interval_ms = ms;
        }

        if let Some(secs) = env_parse::<u64>(constants::ENV_SHUTDOWN_TIMEOUT_SECS) {
            self.shutdown_timeout_secs = secs;
        }

        if let Some(show) = env_flag(constants::ENV_SHOW_ERROR_DETAILS) {
            self.show_error_details = show;
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_dir()?.join(constants::CONFIG_FILE_NAME);
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(config_path)
    }

    /// Message size limit in bytes.
    #[must_use]
    pub fn max_message_bytes(&self) -> usize {
        usize::try_from(self.max_message_size_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// Delivery flush period (at least one millisecond).
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    /// Script runner shutdown deadline.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {name}={raw:?}: not a valid number");
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("Ignoring {name}={raw:?}: expected true or false");
            None
        }
    }
}
