//! Configuration system for ridge sessions.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RIDGE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ridge/config.toml
//!   3. ~/.config/ridge/config.toml
//!
//! All durations are milliseconds. A zero idle time or write timeout
//! disables that check.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::idle::IdleStatus;

/// Top-level configuration, shared by every session a factory creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeConfig {
    pub idle: IdleConfig,
    pub write: WriteConfig,
    pub throughput: ThroughputConfig,
    pub read: ReadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Neither read nor write activity for this long fires BothIdle. 0 = off.
    pub both_ms: u64,
    /// No read activity for this long fires ReaderIdle. 0 = off.
    pub reader_ms: u64,
    /// No write activity for this long fires WriterIdle. 0 = off.
    pub writer_ms: u64,
    /// Period of the background idle scanner.
    pub scan_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// A pending write older than this fails and closes the session. 0 = off.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputConfig {
    /// Minimum spacing between two unforced rate calculations. 0 = only forced.
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Enables `Session::read()`.
    pub use_read_operation: bool,
    /// Initial read buffer size handed to the processor.
    pub buffer_size: usize,
    pub min_buffer_size: usize,
    pub max_buffer_size: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            idle: IdleConfig::default(),
            write: WriteConfig::default(),
            throughput: ThroughputConfig::default(),
            read: ReadConfig::default(),
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            both_ms: 0,
            reader_ms: 0,
            writer_ms: 0,
            scan_interval_ms: 1_000,
        }
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self { timeout_ms: 60_000 }
    }
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self { interval_ms: 3_000 }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            use_read_operation: false,
            buffer_size: 2_048,
            min_buffer_size: 64,
            max_buffer_size: 65_536,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ridge")
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
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("read buffer bounds are inverted: min {min} > max {max}")]
    InvalidBufferBounds { min: usize, max: usize },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RidgeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file, falling back to defaults if it does not exist.
    /// Environment overrides are not applied.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(RidgeConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write the default config to `path` if nothing is there yet.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&RidgeConfig::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Configured idle threshold for one category.
    pub fn idle_time_ms(&self, status: IdleStatus) -> u64 {
        match status {
            IdleStatus::BothIdle => self.idle.both_ms,
            IdleStatus::ReaderIdle => self.idle.reader_ms,
            IdleStatus::WriterIdle => self.idle.writer_ms,
        }
    }

    /// Set one idle threshold. Convenient for builders and tests.
    pub fn set_idle_time_ms(&mut self, status: IdleStatus, ms: u64) {
        match status {
            IdleStatus::BothIdle => self.idle.both_ms = ms,
            IdleStatus::ReaderIdle => self.idle.reader_ms = ms,
            IdleStatus::WriterIdle => self.idle.writer_ms = ms,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read.min_buffer_size > self.read.max_buffer_size {
            return Err(ConfigError::InvalidBufferBounds {
                min: self.read.min_buffer_size,
                max: self.read.max_buffer_size,
            });
        }
        Ok(())
    }

    /// Apply RIDGE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        override_u64("RIDGE_IDLE__BOTH_MS", &mut self.idle.both_ms);
        override_u64("RIDGE_IDLE__READER_MS", &mut self.idle.reader_ms);
        override_u64("RIDGE_IDLE__WRITER_MS", &mut self.idle.writer_ms);
        override_u64("RIDGE_IDLE__SCAN_INTERVAL_MS", &mut self.idle.scan_interval_ms);
        override_u64("RIDGE_WRITE__TIMEOUT_MS", &mut self.write.timeout_ms);
        override_u64("RIDGE_THROUGHPUT__INTERVAL_MS", &mut self.throughput.interval_ms);
        if let Ok(v) = std::env::var("RIDGE_READ__USE_READ_OPERATION") {
            self.read.use_read_operation = v == "true" || v == "1";
        }
    }
}

fn override_u64(var: &str, slot: &mut u64) {
    if let Ok(v) = std::env::var(var) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!(var, value = %v, "ignoring unparsable override"),
        }
    }
}
