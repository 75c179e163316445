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
//! Repository discovery and filter wiring.
//!
//! Everything a command needs is derived from the enclosing git repository:
//! the configuration at `<git-dir>/bigfile/config.toml`, the object store and
//! the transfer capability.

use anyhow::{Context, Result};
use bigfile_config::{Config, ExtensionConfig};
use bigfile_git::{
    BackendTransfer, CommandExtension, Extension, ExtensionRegistry, FilterConfig, FilterDriver, NoTransfer,
    PathFilter, ProgressLog, Transfer, ZstdExtension,
};
use bigfile_storage::{LocalBackend, ObjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The repository a command runs in
#[derive(Debug, Clone)]
pub struct BigfileRepo {
    /// Working tree root, or the git dir for bare repositories
    pub root: PathBuf,
    /// The `.git` directory
    pub git_dir: PathBuf,
    /// Effective configuration
    pub config: Config,
}

impl BigfileRepo {
    /// Discover the repository containing `start` and load its configuration
    pub async fn discover(start: &Path) -> Result<Self> {
        let (root, git_dir) = locate(start)?;
        let config = Config::load(&git_dir)
            .await
            .with_context(|| format!("Failed to load configuration from {}", git_dir.display()))?;
        debug!(root = %root.display(), git_dir = %git_dir.display(), "Repository discovered");
        Ok(Self { root, git_dir, config })
    }

    /// Discover from the current directory
    pub async fn current() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover(&cwd).await
    }

    /// Object store root
    pub fn store_path(&self) -> PathBuf {
        self.config.store_path(&self.git_dir)
    }

    /// Open the local object store, creating it if needed
    pub async fn open_store(&self) -> Result<ObjectStore> {
        let path = self.store_path();
        let store = ObjectStore::open(&path)
            .await
            .with_context(|| format!("Failed to open object store at {}", path.display()))?;
        Ok(store.with_alternates(self.config.alternate_paths(&self.git_dir)))
    }

    /// Remote directory, resolved against the repository root
    pub fn remote_path(&self) -> Option<PathBuf> {
        let path = Path::new(self.config.remote.path.as_deref()?);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }

    /// Progress file, resolved against the repository root
    pub fn progress_path(&self) -> Option<PathBuf> {
        let path = Path::new(self.config.filter.progress_file.as_deref()?);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }

    /// Open the progress file when one is configured
    pub fn progress_log(&self) -> Result<Option<Arc<ProgressLog>>> {
        let Some(path) = self.progress_path() else {
            return Ok(None);
        };
        let log = ProgressLog::open(&path)
            .with_context(|| format!("Failed to open progress file {}", path.display()))?;
        Ok(Some(Arc::new(log)))
    }

    /// Transfer capability for the configured remote
    pub async fn transfer(&self) -> Result<Arc<dyn Transfer>> {
        match self.remote_path() {
            Some(path) => {
                let backend = LocalBackend::new(&path)
                    .await
                    .with_context(|| format!("Failed to open remote directory {}", path.display()))?;
                Ok(Arc::new(BackendTransfer::new(Arc::new(backend))))
            }
            None => Ok(Arc::new(NoTransfer)),
        }
    }

    /// Filter settings; `skip_smudge` forces smudge to leave pointers in place
    pub fn filter_config(&self, skip_smudge: bool) -> Result<FilterConfig> {
        let fetch = &self.config.fetch;
        let fetch_filter = PathFilter::new(&fetch.include, &fetch.exclude).context("Invalid fetch pattern")?;
        Ok(FilterConfig {
            fetch_filter,
            skip_smudge: skip_smudge || self.config.filter.skip_smudge,
            skip_download_errors: self.config.filter.skip_download_errors,
            progress: self.progress_log()?,
        })
    }

    /// Configured extensions
    pub fn extensions(&self) -> Result<ExtensionRegistry> {
        let extensions = self
            .config
            .extensions
            .iter()
            .map(|ext| -> Arc<dyn Extension> {
                match ext {
                    ExtensionConfig::Zstd { priority, level } => Arc::new(ZstdExtension::new(*priority, *level)),
                    ExtensionConfig::Command {
                        name,
                        priority,
                        clean,
                        smudge,
                    } => Arc::new(CommandExtension::new(
                        name.clone(),
                        *priority,
                        clean.clone(),
                        smudge.clone(),
                    )),
                }
            })
            .collect();
        ExtensionRegistry::new(extensions).context("Invalid extension configuration")
    }

    /// Fully wired transform engine
    pub async fn driver(&self, skip_smudge: bool) -> Result<FilterDriver> {
        let store = self.open_store().await?;
        let transfer = self.transfer().await?;
        Ok(FilterDriver::new(self.filter_config(skip_smudge)?, store, transfer).with_extensions(self.extensions()?))
    }
}

/// `(root, git_dir)` of the repository containing `start`
fn locate(start: &Path) -> Result<(PathBuf, PathBuf)> {
    let repo = git2::Repository::discover(start)
        .with_context(|| format!("Not a git repository (or any parent): {}", start.display()))?;
    let git_dir = repo.path().to_path_buf();
    let root = repo.workdir().map(Path::to_path_buf).unwrap_or_else(|| git_dir.clone());
    Ok((root, git_dir))
}
