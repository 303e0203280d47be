//! Runtime configuration for netsort nodes.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $NETSORT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/netsort/config.toml
//!   3. ~/.config/netsort/config.toml
//!
//! A missing file is not an error; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetsortConfig {
    pub shuffle: ShuffleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleConfig {
    /// Pause after the listener starts, before the first outbound send,
    /// so peers have a chance to bind.
    pub startup_delay_ms: u64,
    /// Connection attempts per frame before it is abandoned.
    pub connect_retries: u32,
    /// Fixed sleep between failed connection attempts.
    pub retry_backoff_ms: u64,
    /// Outbound sends allowed in flight at once. 0 is treated as 1.
    pub max_in_flight: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 200,
            connect_retries: 10,
            retry_backoff_ms: 100,
            max_in_flight: 64,
        }
    }
}

impl ShuffleConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("netsort")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl NetsortConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read a config file, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("NETSORT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply NETSORT_* overrides. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
            lookup(name).and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed(&lookup, "NETSORT_SHUFFLE__STARTUP_DELAY_MS") {
            self.shuffle.startup_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "NETSORT_SHUFFLE__CONNECT_RETRIES") {
            self.shuffle.connect_retries = v;
        }
        if let Some(v) = parsed(&lookup, "NETSORT_SHUFFLE__RETRY_BACKOFF_MS") {
            self.shuffle.retry_backoff_ms = v;
        }
        if let Some(v) = parsed(&lookup, "NETSORT_SHUFFLE__MAX_IN_FLIGHT") {
            self.shuffle.max_in_flight = v;
        }
    }
}
