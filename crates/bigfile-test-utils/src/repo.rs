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

//! Test repository management.

use git2::{Repository, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary git repository for integration testing.
///
/// # Example
/// ```ignore
/// use bigfile_test_utils::TestRepo;
///
/// let repo = TestRepo::new();
/// repo.write_file("a.bin", b"pointer text");
/// repo.commit(&["a.bin"], "Add pointer");
/// ```
pub struct TestRepo {
    temp_dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    /// Create and initialize a new repository.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let repo = Repository::init(temp_dir.path()).expect("Failed to init repository");
        Self { temp_dir, repo }
    }

    /// Path to the working tree.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    /// Default object store root (`.git/bigfile`).
    pub fn store_dir(&self) -> PathBuf {
        self.git_dir().join("bigfile")
    }

    /// Sharded path of an object in the default store.
    pub fn object_path(&self, oid_hex: &str) -> PathBuf {
        self.store_dir()
            .join("objects")
            .join(&oid_hex[0..2])
            .join(&oid_hex[2..4])
            .join(oid_hex)
    }

    /// Underlying git2 repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Write `.git/bigfile/config.toml`.
    pub fn write_config(&self, toml: &str) {
        fs::create_dir_all(self.store_dir()).expect("Failed to create state directory");
        fs::write(self.store_dir().join("config.toml"), toml).expect("Failed to write config");
    }

    /// Write a file to the working tree.
    pub fn write_file(&self, name: &str, content: &[u8]) {
        let path = self.file_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write file");
    }

    /// Read a file from the working tree.
    pub fn read_file(&self, name: &str) -> Vec<u8> {
        fs::read(self.file_path(name)).expect("Failed to read file")
    }

    /// Path to a file in the working tree.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Stage files as they are on disk.
    pub fn stage(&self, paths: &[&str]) {
        let mut index = self.repo.index().expect("Failed to open index");
        for path in paths {
            index.add_path(Path::new(path)).expect("Failed to stage file");
        }
        index.write().expect("Failed to write index");
    }

    /// Stage files and commit them on `HEAD`.
    pub fn commit(&self, paths: &[&str], message: &str) {
        self.stage(paths);
        let mut index = self.repo.index().expect("Failed to open index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let sig = Signature::now("Test", "test@example.com").expect("Failed to create signature");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to commit");
    }

    /// Read a string from the repository-local git config.
    pub fn config_value(&self, key: &str) -> Option<String> {
        let config = self.repo.config().ok()?.snapshot().ok()?;
        config.get_string(key).ok()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_creation() {
        let repo = TestRepo::new();
        assert!(repo.git_dir().ends_with(".git"));
        assert!(repo.store_dir().ends_with(".git/bigfile"));
    }

    #[test]
    fn test_write_and_read_file() {
        let repo = TestRepo::new();
        repo.write_file("path/to/nested.txt", b"Hello, World!");
        assert_eq!(repo.read_file("path/to/nested.txt"), b"Hello, World!");
    }

    #[test]
    fn test_commit_twice() {
        let repo = TestRepo::new();
        repo.write_file("a.txt", b"one");
        repo.commit(&["a.txt"], "first");
        repo.write_file("a.txt", b"two");
        repo.commit(&["a.txt"], "second");

        let head = repo.repository().head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 1);
    }
}
