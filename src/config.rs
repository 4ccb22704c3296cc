//! User preferences.
//!
//! - **Config** (`config.json`): theme and tailing knobs, read from the platform
//!   config directory (`~/.config/tailscope/` on Linux).
//! - **Log file** (`tailscope.log`): written under the platform cache directory.
//!
//! The viewer never writes the config; a missing or unreadable file means defaults.

use crate::tail::{DEFAULT_IDLE_TIMEOUT, DEFAULT_LINE_CAPACITY, DEFAULT_POLL_INTERVAL, TailConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// User preferences (read from config.json).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Theme name: "dark" or "light"
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Write silence (ms) after which a session is considered over.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Poll cadence (ms) while waiting for a new session.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Lines buffered between the tailer and the UI.
    #[serde(default = "default_line_capacity")]
    pub line_capacity: usize,
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_line_capacity() -> usize {
    DEFAULT_LINE_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            idle_timeout_ms: default_idle_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            line_capacity: default_line_capacity(),
        }
    }
}

impl Config {
    /// Tailer settings derived from this config. Zero values fall back to defaults.
    pub fn tail_config(&self) -> TailConfig {
        let millis = |ms: u64, fallback: Duration| {
            if ms == 0 {
                fallback
            } else {
                Duration::from_millis(ms)
            }
        };
        TailConfig {
            idle_timeout: millis(self.idle_timeout_ms, DEFAULT_IDLE_TIMEOUT),
            poll_interval: millis(self.poll_interval_ms, DEFAULT_POLL_INTERVAL),
            line_capacity: if self.line_capacity == 0 {
                DEFAULT_LINE_CAPACITY
            } else {
                self.line_capacity
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tailscope"))
}

fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("tailscope"))
}

/// Default log destination (e.g. `~/.cache/tailscope/tailscope.log`).
pub fn default_log_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tailscope.log")
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load config from disk, returning defaults if the file is missing or invalid.
pub fn load_config() -> Config {
    let Some(path) = config_dir().map(|d| d.join("config.json")) else {
        return Config::default();
    };
    load_config_from(&path)
}

fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config; using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
