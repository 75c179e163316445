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

//! In-memory remote for tests
//!
//! [`MockBackend`] keeps objects in a shared map. It counts `get` calls and
//! can be switched into a failing state, so transfer tests can check whether
//! the remote was contacted and how a dead remote is reported.
//!
//! ```rust,no_run
//! use bigfile_storage::{StorageBackend, mock::MockBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let remote = MockBackend::new();
//!     remote.put("test.bin", b"hello world").await?;
//!     assert_eq!(remote.get("test.bin").await?, b"hello world");
//!     assert_eq!(remote.read_count(), 1);
//!     Ok(())
//! }
//! ```

use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Shared {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    reads: AtomicUsize,
    unreachable: AtomicBool,
}

/// In-memory remote; clones see the same objects and counters
#[derive(Clone, Default)]
pub struct MockBackend {
    shared: Arc<Shared>,
}

impl MockBackend {
    /// Empty remote
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn object_count(&self) -> usize {
        self.shared.objects.read().await.len()
    }

    /// `get` calls served so far, failed ones included
    pub fn read_count(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent `get` fail as if the remote were unreachable
    pub fn set_fail_reads(&self, fail: bool) {
        self.shared.unreachable.store(fail, Ordering::SeqCst);
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("reads", &self.read_count())
            .finish_non_exhaustive()
    }
}

fn check_key(key: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!key.is_empty(), "key cannot be empty");
    Ok(())
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        check_key(key)?;
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(
            !self.shared.unreachable.load(Ordering::SeqCst),
            "remote unavailable"
        );

        self.shared
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object not found: {}", key))
    }

    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        check_key(key)?;
        self.shared
            .objects
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        check_key(key)?;
        Ok(self.shared.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        check_key(key)?;
        self.shared.objects.write().await.remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        // BTreeMap keys are already sorted
        Ok(self
            .shared
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_missing() {
        let remote = MockBackend::new();
        remote.put("key", b"test data").await.unwrap();
        assert_eq!(remote.get("key").await.unwrap(), b"test data");

        let err = remote.get("missing").await.unwrap_err();
        assert!(err.to_string().contains("object not found"));
        assert_eq!(remote.read_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let remote = MockBackend::new();
        assert!(remote.get("").await.is_err());
        assert!(remote.put("", b"data").await.is_err());
        assert!(remote.exists("").await.is_err());
        assert!(remote.delete("").await.is_err());
        assert_eq!(remote.read_count(), 0);
    }

    #[tokio::test]
    async fn test_list_objects_by_prefix() {
        let remote = MockBackend::new();
        for key in ["ab/c", "aa/b", "zz/a"] {
            remote.put(key, b"data").await.unwrap();
        }
        assert_eq!(remote.list_objects("a").await.unwrap(), vec!["aa/b", "ab/c"]);
    }

    #[tokio::test]
    async fn test_unreachable_remote() {
        let remote = MockBackend::new();
        remote.put("key", b"data").await.unwrap();

        remote.set_fail_reads(true);
        let err = remote.get("key").await.unwrap_err();
        assert!(err.to_string().contains("remote unavailable"));

        remote.set_fail_reads(false);
        assert!(remote.get("key").await.is_ok());
        assert_eq!(remote.read_count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let first = MockBackend::new();
        let second = first.clone();
        second.put("key", b"data").await.unwrap();
        first.get("key").await.unwrap();

        assert_eq!(first.object_count().await, 1);
        assert_eq!(second.read_count(), 1);

        second.delete("key").await.unwrap();
        second.delete("key").await.unwrap();
        assert_eq!(first.object_count().await, 0);
    }
}
