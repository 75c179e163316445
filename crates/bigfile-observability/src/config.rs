// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Configuration for structured logging.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable consulted before `RUST_LOG`
pub const LOG_ENV_VAR: &str = "BIGFILE_LOG";

/// Level used when nothing else is configured
pub const DEFAULT_LEVEL: &str = "warn";

/// Errors that can occur during logging configuration
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Unknown log format: {0}. Expected one of: pretty, compact, json")]
    InvalidFormat(String),

    #[error("Failed to parse log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Output format for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,

    /// Compact single-line format
    #[default]
    Compact,

    /// JSON format for machine-readable logs
    Json,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format for logs
    pub format: LogFormat,

    /// Filter directive (e.g. "info", "bigfile_git=debug")
    ///
    /// If None, `BIGFILE_LOG` then `RUST_LOG` are consulted.
    pub level: Option<String>,

    /// Whether to use ANSI colors
    pub use_color: bool,

    /// Whether to include timestamps in output
    pub use_timestamps: bool,

    /// Whether to include target module names
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::default(),
            level: None,
            use_color: false,
            use_timestamps: true,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Raise the level for `-v` flags: 1 info, 2 debug, 3 or more trace
    ///
    /// Zero leaves the configuration unchanged.
    pub fn with_verbosity(self, verbose: u8) -> Self {
        match verbose {
            0 => self,
            1 => self.with_level("info"),
            2 => self.with_level("debug"),
            _ => self.with_level("trace"),
        }
    }

    /// Enable or disable color output
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Enable or disable timestamps
    pub fn with_timestamps(mut self, use_timestamps: bool) -> Self {
        self.use_timestamps = use_timestamps;
        self
    }

    /// Enable or disable target module names
    pub fn with_targets(mut self, include_targets: bool) -> Self {
        self.include_targets = include_targets;
        self
    }

    /// Effective filter from config or environment
    pub fn get_effective_level(&self) -> String {
        self.effective_level_from(|name| std::env::var(name).ok())
    }

    pub(crate) fn effective_level_from<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.level
            .clone()
            .or_else(|| lookup(LOG_ENV_VAR))
            .or_else(|| lookup("RUST_LOG"))
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(LogConfig::new().with_verbosity(0).level, None);
        assert_eq!(LogConfig::new().with_verbosity(1).level.as_deref(), Some("info"));
        assert_eq!(LogConfig::new().with_verbosity(2).level.as_deref(), Some("debug"));
        assert_eq!(LogConfig::new().with_verbosity(7).level.as_deref(), Some("trace"));
    }

    #[test]
    fn test_effective_level_precedence() {
        let lookup = |name: &str| match name {
            "BIGFILE_LOG" => Some("debug".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        };
        assert_eq!(LogConfig::new().effective_level_from(lookup), "debug");
        assert_eq!(LogConfig::new().with_level("error").effective_level_from(lookup), "error");

        let rust_only = |name: &str| (name == "RUST_LOG").then(|| "info".to_string());
        assert_eq!(LogConfig::new().effective_level_from(rust_only), "info");
        assert_eq!(LogConfig::new().effective_level_from(|_| None), DEFAULT_LEVEL);
    }
}
