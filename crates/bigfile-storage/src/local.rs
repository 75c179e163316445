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

//! Shared-directory remote backend
//!
//! A directory (local disk, NFS mount, removable drive) acting as the remote
//! object store. It uses the same sharded layout as [`ObjectStore`](crate::ObjectStore),
//! so another clone's store root can serve directly as a remote:
//!
//! ```text
//! root/
//!   objects/
//!     ab/
//!       cd/
//!         abcd1234567890...
//!   tmp/
//! ```
//!
//! Writes go through `tmp/` and an atomic rename.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bigfile_storage::{StorageBackend, local::LocalBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let remote = LocalBackend::new("/mnt/shared/bigfile").await?;
//!     remote.put("abcd1234", b"file content").await?;
//!     assert_eq!(remote.get("abcd1234").await?, b"file content");
//!     Ok(())
//! }
//! ```

use crate::{ObjectReader, StorageBackend};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Shared-directory remote storage backend
///
/// `Send + Sync`; the filesystem provides the synchronization between
/// concurrent writers.
#[derive(Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Open a backend rooted at `root`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Fails if `root` exists but is not a directory.
    pub async fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root).await?;
        } else if !root.is_dir() {
            return Err(anyhow::anyhow!(
                "path exists but is not a directory: {}",
                root.display()
            ));
        }

        Ok(LocalBackend { root })
    }

    /// Get the root path for this backend
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sharded path for a key: `root/objects/AB/CD/key`
    ///
    /// Keys shorter than four characters get fewer shard levels.
    fn object_path(&self, key: &str) -> PathBuf {
        let objects = self.root.join("objects");
        if key.len() >= 4 {
            objects.join(&key[0..2]).join(&key[2..4]).join(key)
        } else if key.len() >= 2 {
            objects.join(&key[0..2]).join(key)
        } else {
            objects.join(key)
        }
    }

    fn validate_key(key: &str) -> anyhow::Result<()> {
        if key.is_empty() {
            return Err(anyhow::anyhow!("key cannot be empty"));
        }
        if key.contains(['/', '\\']) || key == "." || key == ".." || !key.is_ascii() {
            return Err(anyhow::anyhow!("invalid key: {}", key));
        }
        Ok(())
    }

    async fn staging_file(&self) -> anyhow::Result<NamedTempFile> {
        let tmp = self.root.join("tmp");
        fs::create_dir_all(&tmp).await?;
        Ok(NamedTempFile::new_in(tmp)?)
    }

    async fn publish(&self, staged: NamedTempFile, key: &str) -> anyhow::Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        staged.persist(&path).map_err(|e| e.error)?;
        debug!(key = %key, path = %path.display(), "Published object to remote directory");
        Ok(())
    }
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("root", &self.root)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        Self::validate_key(key)?;

        match fs::read(self.object_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(anyhow::anyhow!("object not found: {}", key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        Self::validate_key(key)?;

        let staged = self.staging_file().await?;
        let mut file = fs::File::from_std(staged.reopen()?);
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        self.publish(staged, key).await
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Self::validate_key(key)?;
        Ok(fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        Self::validate_key(key)?;

        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut results = Vec::new();
        let mut work_queue = vec![self.root.join("objects")];

        while let Some(current_path) = work_queue.pop() {
            let mut entries = match fs::read_dir(&current_path).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    work_queue.push(entry.path());
                } else if let Some(key) = entry.file_name().to_str() {
                    if key.starts_with(prefix) {
                        results.push(key.to_string());
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }

    async fn open_read(&self, key: &str) -> anyhow::Result<ObjectReader> {
        Self::validate_key(key)?;

        match fs::File::open(self.object_path(key)).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(anyhow::anyhow!("object not found: {}", key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_file(&self, key: &str, source: &Path) -> anyhow::Result<()> {
        Self::validate_key(key)?;

        let staged = self.staging_file().await?;
        fs::copy(source, staged.path()).await?;
        self.publish(staged, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_new_creates_root_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("remote");

        assert!(!path.exists());
        let backend = LocalBackend::new(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(backend.root(), &path);
    }

    #[tokio::test]
    async fn test_new_fails_with_file_path() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("file.txt");
        std::fs::write(&file_path, b"content").unwrap();

        assert!(LocalBackend::new(&file_path).await.is_err());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        backend.put("abcdef", b"hello").await.unwrap();
        assert_eq!(backend.get("abcdef").await.unwrap(), b"hello");
        assert!(temp_dir.path().join("objects/ab/cd/abcdef").exists());
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        let err = backend.get("missing").await.unwrap_err();
        assert!(err.to_string().contains("object not found"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        assert!(backend.put("", b"x").await.is_err());
        assert!(backend.put("../escape", b"x").await.is_err());
        assert!(backend.get("a/b").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        backend.put("abcdef", b"hello").await.unwrap();
        backend.delete("abcdef").await.unwrap();
        assert!(!backend.exists("abcdef").await.unwrap());
        backend.delete("abcdef").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_objects_sorted_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        for key in ["ffff01", "aaaa02", "aaaa01"] {
            backend.put(key, b"x").await.unwrap();
        }

        assert_eq!(
            backend.list_objects("").await.unwrap(),
            vec!["aaaa01", "aaaa02", "ffff01"]
        );
        assert_eq!(backend.list_objects("aaaa").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_read_streams_file() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();
        backend.put("abcdef", b"streamed").await.unwrap();

        let mut reader = backend.open_read("abcdef").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"streamed");

        assert!(backend.open_read("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_put_file_copies_and_leaves_no_staging() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path().join("remote")).await.unwrap();
        let source = temp_dir.path().join("source.bin");
        std::fs::write(&source, vec![7u8; 100_000]).unwrap();

        backend.put_file("abcdef", &source).await.unwrap();
        assert_eq!(backend.get("abcdef").await.unwrap().len(), 100_000);
        assert_eq!(
            std::fs::read_dir(backend.root().join("tmp")).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let temp_dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp_dir.path()).await.unwrap();

        let mut handles = vec![];
        for i in 0..10 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("key{:04}", i);
                backend.put(&key, format!("data {}", i).as_bytes()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(backend.list_objects("key").await.unwrap().len(), 10);
    }
}
