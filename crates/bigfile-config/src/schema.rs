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
use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the git dir holding bigfile state and configuration
pub const STATE_DIR: &str = "bigfile";

/// Configuration file names tried in order
pub const CONFIG_FILE_NAMES: [&str; 4] = ["config.toml", "config.yaml", "config.yml", "config.json"];

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Filter session and transform behavior
    pub filter: FilterSettings,

    /// Which paths may trigger downloads
    pub fetch: FetchConfig,

    /// Local object store
    pub storage: StorageConfig,

    /// Shared object directory used for transfers
    pub remote: RemoteConfig,

    /// Transform extensions, applied in priority order on clean
    pub extensions: Vec<ExtensionConfig>,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Config file inside `git_dir`, if one exists
    pub fn find_file(git_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = git_dir.as_ref().join(STATE_DIR);
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load config from a git dir, falling back to defaults when absent
    ///
    /// Environment overrides are applied and the result validated.
    pub async fn load(git_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        use crate::validation::Validator;
        use crate::ConfigLoader;

        let loader = ConfigLoader::without_validation();
        let mut config = match Self::find_file(git_dir) {
            Some(path) => loader.load_file(&path).await?,
            None => Self::default(),
        };
        loader.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config as TOML inside a git dir
    pub fn save(&self, git_dir: impl AsRef<Path>) -> ConfigResult<PathBuf> {
        let config_path = git_dir.as_ref().join(STATE_DIR).join(CONFIG_FILE_NAMES[0]);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, toml_str)?;
        Ok(config_path)
    }

    /// Object store root: `storage.path` or `<git-dir>/bigfile`
    ///
    /// Relative paths resolve against the git dir.
    pub fn store_path(&self, git_dir: &Path) -> PathBuf {
        match &self.storage.path {
            Some(path) => resolve(git_dir, path),
            None => git_dir.join(STATE_DIR),
        }
    }

    /// Alternate object directories, resolved against the git dir
    pub fn alternate_paths(&self, git_dir: &Path) -> Vec<PathBuf> {
        self.storage
            .alternates
            .iter()
            .map(|path| resolve(git_dir, path))
            .collect()
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Filter behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterSettings {
    /// Largest payload accepted in one session request (bytes)
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u64,

    /// Never download on smudge; missing objects stay pointers
    #[serde(default)]
    pub skip_smudge: bool,

    /// Answer failed downloads with the pointer instead of aborting
    #[serde(default)]
    pub skip_download_errors: bool,

    /// File receiving `<op> <done>/<total> <filename>` progress lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_file: Option<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            max_payload_size: default_max_payload_size(),
            skip_smudge: false,
            skip_download_errors: false,
            progress_file: None,
        }
    }
}

/// Fetch path filters
///
/// An empty include list allows every path; exclude wins over include.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Glob patterns allowed to download
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns never downloaded
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Local object store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Store root; defaults to `<git-dir>/bigfile`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Reference object directories consulted before downloading
    #[serde(default)]
    pub alternates: Vec<String>,
}

/// Remote object directory
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Shared directory objects are pushed to and fetched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A transform extension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtensionConfig {
    /// Built-in zstd compression
    Zstd {
        /// Position in the pipeline (0..=9)
        priority: u8,
        /// Compression level
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
    /// External program pair; `%f` expands to the file name
    Command {
        name: String,
        priority: u8,
        clean: String,
        smudge: String,
    },
}

impl ExtensionConfig {
    /// Extension name as recorded in pointers
    pub fn name(&self) -> &str {
        match self {
            ExtensionConfig::Zstd { .. } => "zstd",
            ExtensionConfig::Command { name, .. } => name,
        }
    }

    /// Pipeline position
    pub fn priority(&self) -> u8 {
        match self {
            ExtensionConfig::Zstd { priority, .. } | ExtensionConfig::Command { priority, .. } => *priority,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_max_payload_size() -> u64 {
    1 << 32
}

fn default_zstd_level() -> i32 {
    3
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}
