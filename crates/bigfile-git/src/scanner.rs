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

//! Pointers reachable from history and the index
//!
//! Every blob small enough to be a pointer is decoded. Blobs are visited once
//! per blob id and results are collapsed by pointer oid, so a file that never
//! changed across thousands of commits costs one decode.

use crate::error::{GitError, GitResult};
use crate::pointer::{Pointer, MAX_POINTER_SIZE};
use git2::{ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where a pointer was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerSource {
    /// Tree of this commit (hex id)
    Commit(String),
    /// The staging index
    Index,
}

impl fmt::Display for PointerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerSource::Commit(id) => write!(f, "commit {}", &id[..id.len().min(12)]),
            PointerSource::Index => f.write_str("index"),
        }
    }
}

/// A pointer found in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPointer {
    /// Path of the first file seen carrying this pointer
    pub name: String,
    /// Decoded pointer
    pub pointer: Pointer,
    /// Where it was first seen
    pub source: PointerSource,
}

/// Scans a repository for pointers
pub struct PointerScanner {
    repo: Repository,
}

impl fmt::Debug for PointerScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerScanner")
            .field("path", &self.repo.path())
            .finish()
    }
}

struct Seen {
    blobs: HashSet<git2::Oid>,
    oids: HashSet<bigfile_storage::Oid>,
    found: Vec<ScannedPointer>,
}

impl PointerScanner {
    /// Discover the repository containing `path`
    pub fn open(path: &Path) -> GitResult<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| GitError::RepositoryNotFound(format!("{}: {}", path.display(), e)))?;
        Ok(Self { repo })
    }

    /// Wrap an already open repository
    pub fn from_repository(repo: Repository) -> Self {
        Self { repo }
    }

    /// Underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Pointers reachable from `refs` (default `HEAD`) plus the index
    ///
    /// An unborn `HEAD` contributes no history.
    pub fn scan(&self, refs: &[String]) -> GitResult<Vec<ScannedPointer>> {
        let mut seen = Seen {
            blobs: HashSet::new(),
            oids: HashSet::new(),
            found: Vec::new(),
        };

        let mut walk = self.repo.revwalk()?;
        let mut tips = 0;
        if refs.is_empty() {
            match self.repo.head() {
                Ok(head) => {
                    walk.push(head.peel_to_commit()?.id())?;
                    tips += 1;
                }
                Err(e) if e.code() == git2::ErrorCode::UnbornBranch || e.code() == git2::ErrorCode::NotFound => {
                    debug!("HEAD is unborn, scanning index only");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            for spec in refs {
                let commit = self.repo.revparse_single(spec)?.peel_to_commit()?;
                walk.push(commit.id())?;
                tips += 1;
            }
        }

        let mut commits = 0u64;
        if tips > 0 {
            for id in walk {
                let commit = self.repo.find_commit(id?)?;
                self.scan_commit(&commit, &mut seen)?;
                commits += 1;
            }
        }

        if !self.repo.is_bare() {
            self.scan_index(&mut seen)?;
        }

        info!(
            commits,
            blobs = seen.blobs.len(),
            pointers = seen.found.len(),
            "Repository scan complete"
        );
        Ok(seen.found)
    }

    fn scan_commit(&self, commit: &git2::Commit<'_>, seen: &mut Seen) -> GitResult<()> {
        let tree = commit.tree()?;
        let mut entries = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    entries.push((format!("{}{}", root, name), entry.id()));
                }
            }
            TreeWalkResult::Ok
        })?;

        let source = PointerSource::Commit(commit.id().to_string());
        for (name, blob) in entries {
            self.consider(blob, name, &source, seen)?;
        }
        Ok(())
    }

    fn scan_index(&self, seen: &mut Seen) -> GitResult<()> {
        let index = self.repo.index()?;
        for entry in index.iter() {
            let name = String::from_utf8_lossy(&entry.path).into_owned();
            self.consider(entry.id, name, &PointerSource::Index, seen)?;
        }
        Ok(())
    }

    fn consider(&self, blob: git2::Oid, name: String, source: &PointerSource, seen: &mut Seen) -> GitResult<()> {
        if !seen.blobs.insert(blob) {
            return Ok(());
        }

        let odb = self.repo.odb()?;
        let (size, _) = match odb.read_header(blob) {
            Ok(header) => header,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                warn!(name = %name, blob = %blob, "Blob missing from repository");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if size > MAX_POINTER_SIZE {
            return Ok(());
        }

        let data = self.repo.find_blob(blob)?;
        match Pointer::decode(data.content()) {
            Ok(pointer) if pointer.is_empty_content() => {}
            Ok(pointer) => {
                if seen.oids.insert(pointer.oid) {
                    debug!(name = %name, oid = %pointer.oid, source = %source, "Found pointer");
                    seen.found.push(ScannedPointer {
                        name,
                        pointer,
                        source: source.clone(),
                    });
                }
            }
            Err(e) if e.is_not_a_pointer() => {}
            Err(e) => warn!(name = %name, blob = %blob, error = %e, "Skipping malformed pointer"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigfile_storage::Oid;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn commit_files(repo: &Repository, files: &[(&str, &[u8])], message: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    #[test]
    fn test_scan_history_and_dedupe() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let first = Pointer::new(Oid::hash(b"first"), 5).encode();
        let second = Pointer::new(Oid::hash(b"second"), 6).encode();

        commit_files(&repo, &[("a.bin", &first), ("copy/a.bin", &first), ("notes.txt", b"hello")], "one");
        commit_files(&repo, &[("b.bin", &second)], "two");

        let scanner = PointerScanner::from_repository(repo);
        let found = scanner.scan(&[]).unwrap();
        let mut oids: Vec<Oid> = found.iter().map(|p| p.pointer.oid).collect();
        oids.sort();
        let mut expected = vec![Oid::hash(b"first"), Oid::hash(b"second")];
        expected.sort();
        assert_eq!(oids, expected);
    }

    #[test]
    fn test_scan_index_only() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let staged = Pointer::new(Oid::hash(b"staged"), 6).encode();
        fs::write(temp_dir.path().join("s.bin"), &staged).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("s.bin")).unwrap();
        index.write().unwrap();

        let found = PointerScanner::open(temp_dir.path()).unwrap().scan(&[]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "s.bin");
        assert_eq!(found[0].source, PointerSource::Index);
    }

    #[test]
    fn test_scan_explicit_ref() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        commit_files(&repo, &[("a.bin", &Pointer::new(Oid::hash(b"a"), 1).encode())], "one");

        let scanner = PointerScanner::from_repository(repo);
        assert_eq!(scanner.scan(&["HEAD".to_string()]).unwrap().len(), 1);
        assert!(scanner.scan(&["no-such-ref".to_string()]).is_err());
    }

    #[test]
    fn test_open_outside_repository() {
        let temp_dir = TempDir::new().unwrap();
        let result = PointerScanner::open(temp_dir.path());
        // The temp dir may sit inside some other repository on developer machines
        if let Err(e) = result {
            assert!(matches!(e, GitError::RepositoryNotFound(_)));
        }
    }
}
