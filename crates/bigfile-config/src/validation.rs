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
use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;
use std::collections::HashSet;

/// Highest extension priority a pointer can record
pub const MAX_EXTENSION_PRIORITY: u8 = 9;

/// Whether `name` can be written into and read back from a pointer's
/// `ext-<priority>-<name>` key
pub fn is_valid_extension_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Accepted `observability.log_level` values
pub const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Accepted `observability.log_format` values
pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Validator for configuration settings
pub trait Validator {
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.filter.validate()?;
        self.fetch.validate()?;
        self.storage.validate()?;
        self.remote.validate()?;
        self.extensions.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

impl Validator for FilterSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_payload_size == 0 {
            return Err(ConfigError::invalid_value(
                "filter.max_payload_size",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validator for FetchConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_patterns("fetch.include", &self.include)?;
        check_patterns("fetch.exclude", &self.exclude)
    }
}

fn check_patterns(field: &str, patterns: &[String]) -> ConfigResult<()> {
    for pattern in patterns {
        glob::Pattern::new(pattern)
            .map_err(|e| ConfigError::invalid_value(field, format!("pattern {:?}: {}", pattern, e)))?;
    }
    Ok(())
}

impl Validator for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.path.as_deref() == Some("") {
            return Err(ConfigError::invalid_value("storage.path", "must not be empty"));
        }
        if self.alternates.iter().any(String::is_empty) {
            return Err(ConfigError::invalid_value(
                "storage.alternates",
                "entries must not be empty",
            ));
        }
        Ok(())
    }
}

impl Validator for RemoteConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.path.as_deref() == Some("") {
            return Err(ConfigError::invalid_value("remote.path", "must not be empty"));
        }
        Ok(())
    }
}

impl Validator for ExtensionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.priority() > MAX_EXTENSION_PRIORITY {
            return Err(ConfigError::invalid_value(
                "extensions.priority",
                format!(
                    "{}: must be between 0 and {}, got {}",
                    self.name(),
                    MAX_EXTENSION_PRIORITY,
                    self.priority()
                ),
            ));
        }

        if let ExtensionConfig::Command {
            name, clean, smudge, ..
        } = self
        {
            if !is_valid_extension_name(name) {
                return Err(ConfigError::invalid_value(
                    "extensions.name",
                    format!("{:?} may only contain ASCII letters, digits and '_'", name),
                ));
            }
            if clean.trim().is_empty() || smudge.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "extensions.command",
                    format!("{}: clean and smudge commands are required", name),
                ));
            }
        }
        Ok(())
    }
}

impl Validator for Vec<ExtensionConfig> {
    fn validate(&self) -> ConfigResult<()> {
        let mut priorities = HashSet::new();
        let mut names = HashSet::new();
        for extension in self {
            extension.validate()?;
            if !priorities.insert(extension.priority()) {
                return Err(ConfigError::Conflict(format!(
                    "extension priority {} is used more than once",
                    extension.priority()
                )));
            }
            if !names.insert(extension.name()) {
                return Err(ConfigError::Conflict(format!(
                    "extension {} is configured more than once",
                    extension.name()
                )));
            }
        }
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", LOG_FORMATS.join(", ")),
            ));
        }

        Ok(())
    }
}
