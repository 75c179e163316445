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
use crate::schema::Config;
use crate::validation::Validator;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Environment variables recognized by [`ConfigLoader::apply_env_overrides`]
pub const ENV_OVERRIDES: [&str; 8] = [
    "BIGFILE_SKIP_SMUDGE",
    "BIGFILE_SKIP_DOWNLOAD_ERRORS",
    "BIGFILE_PROGRESS",
    "BIGFILE_FETCH_INCLUDE",
    "BIGFILE_FETCH_EXCLUDE",
    "BIGFILE_REMOTE_PATH",
    "BIGFILE_LOG_LEVEL",
    "GIT_LFS_SKIP_SMUDGE",
];

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        let format = ConfigFormat::from_path(path)?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };

        debug!("Configuration loaded from {}", format.name());

        if self.validate {
            config.validate()?;
            debug!("Configuration validated successfully");
        }

        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub async fn load_with_overrides<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let mut config = self.load_file(path).await?;
        self.apply_env_overrides(&mut config)?;
        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        self.apply_overrides_from(config, |name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Pattern lists are comma separated; an empty value clears the list.
    pub fn apply_overrides_from<F>(&self, config: &mut Config, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Filter settings
        if let Some(value) = lookup("GIT_LFS_SKIP_SMUDGE") {
            config.filter.skip_smudge = parse_bool("GIT_LFS_SKIP_SMUDGE", &value)?;
        }
        if let Some(value) = lookup("BIGFILE_SKIP_SMUDGE") {
            config.filter.skip_smudge = parse_bool("BIGFILE_SKIP_SMUDGE", &value)?;
        }
        if let Some(value) = lookup("BIGFILE_SKIP_DOWNLOAD_ERRORS") {
            config.filter.skip_download_errors = parse_bool("BIGFILE_SKIP_DOWNLOAD_ERRORS", &value)?;
        }
        if let Some(value) = lookup("BIGFILE_PROGRESS") {
            config.filter.progress_file = (!value.is_empty()).then_some(value);
        }

        // Fetch filters
        if let Some(value) = lookup("BIGFILE_FETCH_INCLUDE") {
            config.fetch.include = split_patterns(&value);
        }
        if let Some(value) = lookup("BIGFILE_FETCH_EXCLUDE") {
            config.fetch.exclude = split_patterns(&value);
        }

        // Remote
        if let Some(value) = lookup("BIGFILE_REMOTE_PATH") {
            config.remote.path = (!value.is_empty()).then_some(value);
        }

        // Observability
        if let Some(value) = lookup("BIGFILE_LOG_LEVEL") {
            config.observability.log_level = value;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn split_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(variable: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" | "" => Ok(false),
        _ => Err(ConfigError::env_override(
            variable,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path("config.toml").unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path("config.yaml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.yml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.json").unwrap(), ConfigFormat::Json);
    }

    #[test]
    fn test_format_detection_error() {
        assert!(ConfigFormat::from_path("config.xml").is_err());
        assert!(ConfigFormat::from_path("config").is_err());
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "yes", "1", "on", "TRUE"] {
            assert!(parse_bool("X", yes).unwrap());
        }
        for no in ["false", "no", "0", "off", ""] {
            assert!(!parse_bool("X", no).unwrap());
        }
        assert!(parse_bool("X", "invalid").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new();
        let toml = r#"
        [filter]
        skip_download_errors = true

        [fetch]
        include = ["assets/**"]
        exclude = ["assets/raw/**"]

        [[extensions]]
        kind = "zstd"
        priority = 0
        "#;
        let config = loader.load_from_string(toml, ConfigFormat::Toml).unwrap();
        assert!(config.filter.skip_download_errors);
        assert_eq!(config.fetch.exclude, vec!["assets/raw/**"]);
        assert_eq!(config.extensions[0].name(), "zstd");
    }

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new();
        let json = r#"{"remote": {"path": "/srv/objects"}, "observability": {"log_level": "debug"}}"#;
        let config = loader.load_from_string(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.remote.path.as_deref(), Some("/srv/objects"));
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_level() {
        let json = r#"{"observability": {"log_level": "loud"}}"#;
        assert!(ConfigLoader::new().load_from_string(json, ConfigFormat::Json).is_err());
        assert!(ConfigLoader::without_validation()
            .load_from_string(json, ConfigFormat::Json)
            .is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::new();
        let mut config = Config::default();
        loader
            .apply_overrides_from(
                &mut config,
                env(&[
                    ("BIGFILE_SKIP_SMUDGE", "yes"),
                    ("BIGFILE_FETCH_INCLUDE", "*.psd, textures/**"),
                    ("BIGFILE_REMOTE_PATH", "/mnt/shared"),
                    ("BIGFILE_LOG_LEVEL", "trace"),
                    ("BIGFILE_PROGRESS", "/tmp/bigfile-progress"),
                ]),
            )
            .unwrap();
        assert!(config.filter.skip_smudge);
        assert_eq!(config.filter.progress_file.as_deref(), Some("/tmp/bigfile-progress"));
        assert_eq!(config.fetch.include, vec!["*.psd", "textures/**"]);
        assert_eq!(config.remote.path.as_deref(), Some("/mnt/shared"));
        assert_eq!(config.observability.log_level, "trace");
    }

    #[test]
    fn test_native_switch_wins_over_compat_switch() {
        let loader = ConfigLoader::new();
        let mut config = Config::default();
        loader
            .apply_overrides_from(&mut config, env(&[("GIT_LFS_SKIP_SMUDGE", "1")]))
            .unwrap();
        assert!(config.filter.skip_smudge);

        let mut config = Config::default();
        loader
            .apply_overrides_from(
                &mut config,
                env(&[("GIT_LFS_SKIP_SMUDGE", "1"), ("BIGFILE_SKIP_SMUDGE", "0")]),
            )
            .unwrap();
        assert!(!config.filter.skip_smudge);
    }

    #[test]
    fn test_bad_env_bool() {
        let err = ConfigLoader::new()
            .apply_overrides_from(&mut Config::default(), env(&[("BIGFILE_SKIP_DOWNLOAD_ERRORS", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("BIGFILE_SKIP_DOWNLOAD_ERRORS"));
    }
}
