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

//! Local content-addressable object store
//!
//! Objects are raw bytes named by the SHA-256 of those bytes:
//!
//! ```text
//! root/
//!   objects/
//!     84/
//!       d8/
//!         84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882
//!   tmp/
//!     .tmpXXXXXX
//! ```
//!
//! Writers stream into `tmp/` (same volume as `objects/`) while hashing, and
//! only rename into the sharded location once the full digest is known, so a
//! reader never observes a partially written object. Two processes racing on
//! the same content converge on one canonical file: the bytes are identical by
//! construction.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bigfile_storage::ObjectStore;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = ObjectStore::open(".git/bigfile").await?;
//! let temp = store.put(&b"0123456789"[..], Some(10)).await?;
//! let oid = *temp.oid();
//! store.commit(temp, false).await?;
//! assert!(store.contains(&oid).await?);
//! # Ok(())
//! # }
//! ```

use crate::error::{StorageError, StorageResult};
use crate::oid::{Oid, HASH_BUFFER_SIZE};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Content staged in `tmp/` whose digest is known but which is not yet
/// visible under `objects/`
///
/// Dropping a `TempObject` without committing it removes the temp file.
#[derive(Debug)]
pub struct TempObject {
    path: TempPath,
    oid: Oid,
    size: u64,
}

impl TempObject {
    /// Digest of the staged bytes
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Number of staged bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Location of the staged bytes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the staged file as a plain temporary file, never to be committed
    pub fn into_temp_path(self) -> TempPath {
        self.path
    }

    /// Remove the staged file now instead of on drop
    pub fn discard(self) -> StorageResult<()> {
        self.path.close()?;
        Ok(())
    }
}

/// Result of committing a [`TempObject`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The staged file was renamed into place
    Stored(PathBuf),
    /// A canonical object already existed and was kept; the staged file was discarded
    Existing(PathBuf),
}

impl CommitOutcome {
    /// Canonical object path
    pub fn path(&self) -> &Path {
        match self {
            CommitOutcome::Stored(path) | CommitOutcome::Existing(path) => path,
        }
    }
}

/// Sharded local object store with atomic writes
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    objects_dir: PathBuf,
    tmp_dir: PathBuf,
    alternates: Vec<PathBuf>,
}

impl ObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            return Err(StorageError::invalid_key(format!(
                "path exists but is not a directory: {}",
                root.display()
            )));
        }

        let objects_dir = root.join("objects");
        let tmp_dir = root.join("tmp");
        fs::create_dir_all(&objects_dir).await?;
        fs::create_dir_all(&tmp_dir).await?;

        Ok(Self {
            root,
            objects_dir,
            tmp_dir,
            alternates: Vec::new(),
        })
    }

    /// Add read-only alternate store roots consulted by [`link_from_alternates`](Self::link_from_alternates)
    pub fn with_alternates(mut self, alternates: Vec<PathBuf>) -> Self {
        self.alternates = alternates;
        self
    }

    /// Store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging directory for in-flight writes
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Canonical path for `oid`: `objects/<2>/<2>/<oid>`
    pub fn object_path(&self, oid: &Oid) -> PathBuf {
        Self::sharded_path(&self.objects_dir, oid)
    }

    fn sharded_path(objects_dir: &Path, oid: &Oid) -> PathBuf {
        let (shard1, shard2) = oid.shards();
        objects_dir.join(shard1).join(shard2).join(oid.to_hex())
    }

    /// Create an empty scratch file inside the staging directory
    ///
    /// Used for intermediate pipeline stages that must live on the same volume.
    pub fn scratch_file(&self) -> StorageResult<NamedTempFile> {
        Ok(NamedTempFile::new_in(&self.tmp_dir)?)
    }

    /// Stream `reader` into the staging area while hashing it
    ///
    /// When `expected_size` is given and the stream length differs, the staged
    /// file is removed and [`StorageError::SizeMismatch`] is returned.
    pub async fn put<R>(&self, mut reader: R, expected_size: Option<u64>) -> StorageResult<TempObject>
    where
        R: AsyncRead + Unpin,
    {
        let (std_file, path) = self.scratch_file()?.into_parts();
        let mut file = fs::File::from_std(std_file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        let mut size: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            file.write_all(&buffer[..n]).await?;
            size += n as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = expected_size {
            if expected != size {
                return Err(StorageError::SizeMismatch {
                    expected,
                    actual: size,
                });
            }
        }

        let oid = Oid::from_digest(hasher.finalize().into());
        debug!(oid = %oid, size, "Staged object");
        Ok(TempObject { path, oid, size })
    }

    /// Turn a finished scratch file into a [`TempObject`], hashing it in place
    ///
    /// The file must live in [`tmp_dir`](Self::tmp_dir) so the later rename
    /// stays on one volume.
    pub async fn adopt(&self, path: TempPath) -> StorageResult<TempObject> {
        if path.parent() != Some(self.tmp_dir.as_path()) {
            return Err(StorageError::invalid_key(format!(
                "{} is outside the staging directory",
                path.display()
            )));
        }
        let oid = Oid::from_file_async(&path).await?;
        let size = fs::metadata(&path).await?.len();
        Ok(TempObject { path, oid, size })
    }

    /// Make a staged object visible under its canonical path
    ///
    /// An existing object of the same size wins. A size conflict without
    /// extensions is a data inconsistency and nothing is overwritten; with
    /// extensions the stored bytes depend on extension output, so the existing
    /// object still wins.
    pub async fn commit(&self, temp: TempObject, extensions_applied: bool) -> StorageResult<CommitOutcome> {
        let canonical = self.object_path(&temp.oid);

        match fs::metadata(&canonical).await {
            Ok(meta) => {
                let existing = meta.len();
                if existing != temp.size && !extensions_applied {
                    return Err(StorageError::Inconsistent {
                        oid: temp.oid,
                        existing,
                        incoming: temp.size,
                        path: canonical,
                    });
                }
                if existing != temp.size {
                    warn!(
                        oid = %temp.oid,
                        existing,
                        incoming = temp.size,
                        "Existing object size differs after extensions; keeping stored object"
                    );
                }
                debug!(oid = %temp.oid, "Object already stored");
                temp.discard()?;
                Ok(CommitOutcome::Existing(canonical))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = canonical.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let oid = temp.oid;
                temp.path
                    .persist(&canonical)
                    .map_err(|e| StorageError::Io(e.error))?;
                debug!(oid = %oid, path = %canonical.display(), "Stored object");
                Ok(CommitOutcome::Stored(canonical))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the canonical path of a stored object without verifying it
    pub async fn get(&self, oid: &Oid) -> StorageResult<PathBuf> {
        let path = self.object_path(oid);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::not_found(oid.to_hex())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(oid.to_hex())),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether an object is present locally
    pub async fn contains(&self, oid: &Oid) -> StorageResult<bool> {
        match self.get(oid).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Re-hash a stored object and compare with its name
    pub async fn verify(&self, oid: &Oid) -> StorageResult<bool> {
        let path = self.get(oid).await?;
        let actual = Oid::from_file_async(&path).await?;
        Ok(actual == *oid)
    }

    /// Delete a stored object; returns whether anything was removed
    pub async fn remove(&self, oid: &Oid) -> StorageResult<bool> {
        match fs::remove_file(self.object_path(oid)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Bring an object in from an alternate store if one has it
    ///
    /// The candidate's hash is checked before it is used; a corrupt alternate
    /// object is skipped. Hard-links when possible and falls back to a hashed
    /// copy through the staging area. Returns `true` when the object is now
    /// present locally.
    pub async fn link_from_alternates(&self, oid: &Oid, size: u64) -> StorageResult<bool> {
        if self.alternates.is_empty() {
            return Ok(false);
        }
        let canonical = self.object_path(oid);

        for alternate in &self.alternates {
            let candidate = Self::sharded_path(&alternate.join("objects"), oid);
            let meta = match fs::metadata(&candidate).await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if meta.len() != size {
                debug!(oid = %oid, alternate = %alternate.display(), "Alternate object has wrong size");
                continue;
            }
            if Oid::from_file_async(&candidate).await? != *oid {
                warn!(oid = %oid, alternate = %alternate.display(), "Alternate object is corrupt");
                continue;
            }

            if let Some(parent) = canonical.parent() {
                fs::create_dir_all(parent).await?;
            }
            if fs::hard_link(&candidate, &canonical).await.is_ok() {
                debug!(oid = %oid, alternate = %alternate.display(), "Linked object from alternate");
                return Ok(true);
            }

            let file = fs::File::open(&candidate).await?;
            let temp = self.put(file, Some(size)).await?;
            if temp.oid() != oid {
                warn!(oid = %oid, alternate = %alternate.display(), "Alternate object is corrupt");
                temp.discard()?;
                continue;
            }
            self.commit(temp, false).await?;
            debug!(oid = %oid, alternate = %alternate.display(), "Copied object from alternate");
            return Ok(true);
        }

        Ok(false)
    }

    /// List every object stored locally, sorted
    pub async fn list(&self) -> StorageResult<Vec<Oid>> {
        let mut results = Vec::new();
        let mut work_queue = vec![self.objects_dir.clone()];

        while let Some(dir) = work_queue.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    work_queue.push(entry.path());
                } else if let Some(oid) = entry.file_name().to_str().and_then(|name| Oid::from_hex(name).ok()) {
                    results.push(oid);
                }
            }
        }

        results.sort();
        Ok(results)
    }
}
