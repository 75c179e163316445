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

//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Failure to read, parse or validate a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("cannot access configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or schema error
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML syntax or schema error
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or schema error
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the configuration back out failed
    #[error("cannot serialize configuration: {0}")]
    Serialize(String),

    /// File extension is not one of toml, yaml, yml, json
    #[error("unsupported configuration format {0:?} (expected toml, yaml or json)")]
    UnsupportedFormat(String),

    /// No file at the given path
    #[error("no configuration file at {}", .0.display())]
    NotFound(PathBuf),

    /// Path has no usable file name or parent
    #[error("invalid configuration path {}", .0.display())]
    InvalidPath(PathBuf),

    /// A `BIGFILE_*` variable could not be parsed
    #[error("cannot apply {variable}={value:?}: {reason}")]
    EnvOverride {
        variable: String,
        value: String,
        reason: String,
    },

    /// A single field holds an unusable value
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Two entries collide, e.g. extensions sharing a priority
    #[error("conflicting configuration: {0}")]
    Conflict(String),
}

impl ConfigError {
    pub(crate) fn env_override(
        variable: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::EnvOverride {
            variable: variable.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e.to_string())
    }
}

/// Result alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
