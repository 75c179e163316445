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

//! Object storage for bigfile
//!
//! Two layers live here:
//!
//! - [`ObjectStore`]: the local content-addressable store every clean and
//!   smudge reads and writes through.
//! - [`StorageBackend`]: an async key/value interface to a *remote* object
//!   store, with a shared-directory implementation ([`LocalBackend`]) and an
//!   in-memory one ([`mock::MockBackend`]) for tests.
//!
//! # Examples
//!
//! ```no_run
//! use bigfile_storage::{StorageBackend, mock::MockBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let remote = MockBackend::new();
//!     remote.put("84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882", b"0123456789").await?;
//!     assert!(remote.exists("84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882").await?);
//!     Ok(())
//! }
//! ```
//!
//! # Implementation Guide
//!
//! When implementing `StorageBackend`:
//!
//! 1. Use `#[async_trait]` on the impl block
//! 2. Return `anyhow::Result<T>`; missing keys should mention "object not found"
//! 3. Reject empty keys
//! 4. Keep `delete` idempotent and `list_objects` sorted
//! 5. Override [`StorageBackend::open_read`] / [`StorageBackend::put_file`]
//!    when the backend can stream instead of buffering whole objects

pub mod cas;
pub mod error;
pub mod local;
pub mod mock;
pub mod oid;

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use tokio::io::AsyncRead;

pub use cas::{CommitOutcome, ObjectStore, TempObject};
pub use error::{StorageError, StorageResult};
pub use local::LocalBackend;
pub use oid::{Oid, OID_HEX_LEN};

/// Boxed byte stream returned by [`StorageBackend::open_read`]
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Remote object storage
///
/// Keys are opaque non-empty strings; bigfile uses the lowercase hex oid.
/// Implementations must be `Send + Sync + Debug` so they can sit behind an
/// `Arc<dyn StorageBackend>`.
///
/// ```rust,no_run
/// # use bigfile_storage::{StorageBackend, mock::MockBackend};
/// #[tokio::main]
/// async fn example() -> anyhow::Result<()> {
///     let backend: Box<dyn StorageBackend> = Box::new(MockBackend::new());
///
///     backend.put("my_key", b"my_data").await?;
///     let retrieved = backend.get("my_key").await?;
///     assert_eq!(retrieved, b"my_data");
///
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Retrieve an object by its key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, doesn't exist ("object not
    /// found"), or an I/O error occurs.
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;

    /// Store an object, overwriting any previous value
    async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Delete an object; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Sorted list of keys starting with `prefix` (empty prefix lists all)
    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Open an object as a byte stream
    ///
    /// The default buffers the whole object through [`get`](Self::get).
    async fn open_read(&self, key: &str) -> anyhow::Result<ObjectReader> {
        let data = self.get(key).await?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    /// Store the contents of a local file
    ///
    /// The default reads the file into memory and calls [`put`](Self::put).
    async fn put_file(&self, key: &str, source: &Path) -> anyhow::Result<()> {
        let data = tokio::fs::read(source).await?;
        self.put(key, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn trait_is_object_safe() {
        fn _check_object_safe(_: &dyn StorageBackend) {}
    }

    #[tokio::test]
    async fn default_open_read_streams_get() {
        let backend = mock::MockBackend::new();
        backend.put("key", b"streamed").await.unwrap();

        let mut reader = backend.open_read("key").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"streamed");
    }

    #[tokio::test]
    async fn default_put_file_reads_source() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("source.bin");
        std::fs::write(&source, b"from disk").unwrap();

        let backend = mock::MockBackend::new();
        backend.put_file("key", &source).await.unwrap();
        assert_eq!(backend.get("key").await.unwrap(), b"from disk");
    }
}
