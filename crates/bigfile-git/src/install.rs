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

//! Filter driver registration and `.gitattributes` tracking
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bigfile_git::install::{install, track_pattern, InstallOptions};
//! use std::path::Path;
//!
//! install(Path::new("/path/to/repo"), &InstallOptions::default())?;
//! track_pattern(Path::new("/path/to/repo"), "*.psd")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{GitError, GitResult};
use git2::Repository;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Filter driver name used in Git configuration and `.gitattributes`
pub const FILTER_DRIVER_NAME: &str = "bigfile";

/// Installation options
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Program name written into the filter commands
    pub program: String,
    /// Install the variant that leaves pointers in the working tree
    pub skip_smudge: bool,
    /// Overwrite a different existing configuration
    pub force: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            program: "bigfile".to_string(),
            skip_smudge: false,
            force: false,
        }
    }
}

impl InstallOptions {
    /// `(key, value)` pairs written to the repository config
    ///
    /// Only the single-shot commands are registered. Git reserves
    /// `filter.<driver>.process` for its own pkt-line protocol, which
    /// `bigfile filter` does not speak.
    pub fn entries(&self) -> Vec<(String, String)> {
        let skip = if self.skip_smudge { " --skip" } else { "" };
        vec![
            (key("clean"), format!("{} clean -- %f", self.program)),
            (key("smudge"), format!("{} smudge{} -- %f", self.program, skip)),
        ]
    }
}

fn key(name: &str) -> String {
    format!("filter.{}.{}", FILTER_DRIVER_NAME, name)
}

fn open(repo_path: &Path) -> GitResult<Repository> {
    Repository::open(repo_path)
        .map_err(|e| GitError::RepositoryNotFound(format!("{}: {}", repo_path.display(), e)))
}

/// Register the filter driver in a repository's local config
///
/// # Errors
///
/// [`GitError::FilterConflict`] when a different command is already
/// configured and `force` is not set.
pub fn install(repo_path: &Path, options: &InstallOptions) -> GitResult<()> {
    info!("Installing filter driver in repository: {:?}", repo_path);

    let repo = open(repo_path)?;
    let mut config = repo.config()?.open_level(git2::ConfigLevel::Local)?;

    let entries = options.entries();
    if !options.force {
        for (name, value) in &entries {
            match config.get_string(name) {
                Ok(existing) if existing != *value => {
                    return Err(GitError::FilterConflict(format!(
                        "{} = {:?} (use --force to replace)",
                        name, existing
                    )))
                }
                _ => {}
            }
        }
    }

    for (name, value) in &entries {
        config.set_str(name, value)?;
    }
    // Left behind by earlier installs; git would route files through it
    remove_key(&mut config, &key("process"))?;
    // Git aborts the operation if the filter fails
    config.set_bool(&key("required"), true)?;

    info!("Filter driver installed successfully");
    Ok(())
}

/// Remove the filter driver from a repository's local config
pub fn uninstall(repo_path: &Path) -> GitResult<()> {
    let repo = open(repo_path)?;
    let mut config = repo.config()?.open_level(git2::ConfigLevel::Local)?;

    for name in ["process", "clean", "smudge", "required"] {
        remove_key(&mut config, &key(name))?;
    }
    info!("Filter driver removed");
    Ok(())
}

fn remove_key(config: &mut git2::Config, name: &str) -> GitResult<()> {
    match config.remove(name) {
        Ok(()) => Ok(()),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn tracks(line: &str, pattern: &str) -> bool {
    let mut fields = line.split_whitespace();
    fields.next() == Some(pattern)
        && fields.any(|attr| attr == format!("filter={}", FILTER_DRIVER_NAME))
}

fn read_attributes(path: &Path) -> GitResult<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(GitError::GitattributesConfig(e.to_string())),
    }
}

/// Add `pattern` to `.gitattributes`; returns `false` if it was already tracked
pub fn track_pattern(repo_path: &Path, pattern: &str) -> GitResult<bool> {
    let gitattributes_path = repo_path.join(".gitattributes");
    let mut content = read_attributes(&gitattributes_path)?;

    if content.lines().any(|line| tracks(line, pattern)) {
        debug!("Pattern {} already tracked", pattern);
        return Ok(false);
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&format!(
        "{} filter={name} diff={name} merge={name} -text\n",
        pattern,
        name = FILTER_DRIVER_NAME
    ));

    fs::write(&gitattributes_path, content).map_err(|e| GitError::GitattributesConfig(e.to_string()))?;
    info!("Pattern {} added to .gitattributes", pattern);
    Ok(true)
}

/// Remove `pattern` from `.gitattributes`; returns `false` if it was not tracked
pub fn untrack_pattern(repo_path: &Path, pattern: &str) -> GitResult<bool> {
    let gitattributes_path = repo_path.join(".gitattributes");
    let content = read_attributes(&gitattributes_path)?;

    let kept: Vec<&str> = content.lines().filter(|line| !tracks(line, pattern)).collect();
    if kept.len() == content.lines().count() {
        debug!("Pattern {} was not tracked", pattern);
        return Ok(false);
    }

    let mut new_content = kept.join("\n");
    if !new_content.is_empty() {
        new_content.push('\n');
    }
    fs::write(&gitattributes_path, new_content).map_err(|e| GitError::GitattributesConfig(e.to_string()))?;

    info!("Pattern {} removed from .gitattributes", pattern);
    Ok(true)
}

/// Patterns currently routed through the filter
pub fn tracked_patterns(repo_path: &Path) -> GitResult<Vec<String>> {
    let content = read_attributes(&repo_path.join(".gitattributes"))?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let pattern = line.split_whitespace().next()?;
            tracks(line, pattern).then(|| pattern.to_string())
        })
        .collect())
}
