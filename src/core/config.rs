// src/core/config.rs

//! # Runner Settings
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. built-in defaults,
//! 2. the optional user file `<config_dir>/whet/config.toml`,
//! 3. the `WHET_SHELL` and `WHET_WATCH_INTERVAL_MS` environment variables.
//!
//! The user file is never created implicitly.

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILENAME};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SHELL_ENV_VAR: &str = "WHET_SHELL";
pub const WATCH_INTERVAL_ENV_VAR: &str = "WHET_WATCH_INTERVAL_MS";

/// Status width when stdout is not a terminal.
const DEFAULT_STATUS_WIDTH: usize = 80;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid value '{value}' for {var}: expected {expected}")]
    Env {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Program used to run `sh`-family commands, as `<shell> -c <command>`.
    pub shell: String,
    /// How often file watchers poll for changes.
    pub watch_interval_ms: u64,
    /// Width of `printStatus` lines. Falls back to `$COLUMNS`, then 80.
    pub status_width: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            watch_interval_ms: 250,
            status_width: None,
        }
    }
}

impl Settings {
    /// Resolves every layer against the real environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match user_settings_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|var| std::env::var(var).ok())?;
        log::debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup(SHELL_ENV_VAR).filter(|s| !s.trim().is_empty()) {
            self.shell = shell;
        }
        if let Some(value) = lookup(WATCH_INTERVAL_ENV_VAR) {
            self.watch_interval_ms = value.trim().parse().map_err(|_| ConfigError::Env {
                var: WATCH_INTERVAL_ENV_VAR,
                value,
                expected: "a number of milliseconds",
            })?;
        }
        Ok(())
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }

    /// The `printStatus` line width: the setting, else the width of the
    /// terminal on stdout.
    pub fn status_width(&self) -> usize {
        let columns = console::Term::stdout()
            .size_checked()
            .map(|(_, columns)| usize::from(columns));
        self.resolve_status_width(columns)
    }

    fn resolve_status_width(&self, terminal_columns: Option<usize>) -> usize {
        self.status_width
            .or(terminal_columns)
            .or_else(|| std::env::var("COLUMNS").ok()?.trim().parse().ok())
            .filter(|width| *width > 0)
            .unwrap_or(DEFAULT_STATUS_WIDTH)
    }
}

/// `<config_dir>/whet/config.toml`, when the platform has a config directory.
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

// MARK: --- UNIT TESTS ---
