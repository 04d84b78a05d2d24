//! Configuration for termplex.
//!
//! Engine defaults are read from `~/.termplex/config.toml`:
//!
//! ```toml
//! # Shell hint passed to new sessions (optional)
//! shell = "bash"
//!
//! # Initial screen size
//! cols = 80
//! rows = 24
//!
//! # Per-session event queue; events beyond it are dropped
//! event_queue_capacity = 100
//!
//! # Log filter used when RUST_LOG is not set
//! log_level = "info"
//! ```
//!
//! A missing or unreadable file yields the defaults.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::event::DEFAULT_EVENT_QUEUE_CAPACITY;
use crate::core::session::SessionOptions;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default shell hint
    pub shell: Option<String>,
    /// Initial columns of a new session
    pub cols: u16,
    /// Initial rows of a new session
    pub rows: u16,
    /// Events buffered per session before new ones are dropped
    pub event_queue_capacity: usize,
    /// Default log filter
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            shell: None,
            cols: options.cols,
            rows: options.rows,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                match fs::read_to_string(&path) {
                    Ok(content) => match Self::parse(&content) {
                        Ok(config) => return config,
                        Err(e) => warn!(path = %path.display(), error = %e, "invalid config, using defaults"),
                    },
                    Err(e) => warn!(path = %path.display(), error = %e, "cannot read config"),
                }
            }
        }
        Self::default()
    }

    /// Parse TOML, replacing zero sizes with defaults
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(content)?;
        Ok(config.sanitized())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf, String> {
        let path = Self::get_config_path().ok_or("Could not determine config path")?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(path)
    }

    /// Options for sessions created with configured defaults
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            shell: self.shell.clone(),
            cols: self.cols,
            rows: self.rows,
        }
    }

    /// Directory holding the config and log files
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".termplex"))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        let dir = Self::config_dir()?;
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.cols == 0 {
            self.cols = defaults.cols;
        }
        if self.rows == 0 {
            self.rows = defaults.rows;
        }
        if self.event_queue_capacity == 0 {
            self.event_queue_capacity = defaults.event_queue_capacity;
        }
        self
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!((config.cols, config.rows), (80, 24));
        assert_eq!(config.event_queue_capacity, 100);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse("shell = \"zsh\"\ncols = 132\n").unwrap();
        assert_eq!(config.shell.as_deref(), Some("zsh"));
        assert_eq!(config.cols, 132);
        assert_eq!(config.rows, 24);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_zero_sizes_fall_back() {
        let config = Config::parse("cols = 0\nrows = 0\nevent_queue_capacity = 0\n").unwrap();
        assert_eq!((config.cols, config.rows), (80, 24));
        assert_eq!(config.event_queue_capacity, 100);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("cols = \"wide\"").is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config {
            shell: Some("bash".to_string()),
            log_level: "debug".to_string(),
            ..Config::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_session_options() {
        let config = Config::parse("shell = \"sh\"\nrows = 40\n").unwrap();
        assert_eq!(
            config.session_options(),
            SessionOptions::new(80, 40).with_shell("sh")
        );
    }
}
