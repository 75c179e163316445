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

//! Remote transfer capability
//!
//! The transform engine never talks to a remote directly. It asks a
//! [`Transfer`] for a byte stream on smudge, and the `push` command hands it
//! local objects to upload. Authentication, retries and wire formats belong to
//! the implementation.

use crate::error::{TransferError, TransferResult};
use async_trait::async_trait;
use bigfile_storage::{Oid, StorageBackend};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::debug;

/// Progress callback: `(bytes_done, bytes_total)`
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Byte stream returned by [`Transfer::download`]
pub type DownloadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Acknowledgement of a finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    /// Uploaded object
    pub oid: Oid,
    /// Bytes uploaded
    pub size: u64,
    /// Whether the remote already had the object
    pub already_present: bool,
}

/// Opaque upload/download capability
#[async_trait]
pub trait Transfer: Send + Sync + Debug {
    /// Open a stream of the object's bytes
    ///
    /// The caller verifies size and hash while storing the stream.
    async fn download(
        &self,
        oid: &Oid,
        size: u64,
        progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<DownloadStream>;

    /// Upload the object stored at `source`
    async fn upload(
        &self,
        oid: &Oid,
        size: u64,
        source: &Path,
        progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<UploadAck>;
}

/// Transfer over any [`StorageBackend`], keyed by hex oid
#[derive(Debug, Clone)]
pub struct BackendTransfer {
    backend: Arc<dyn StorageBackend>,
}

impl BackendTransfer {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }
}

fn backend_error(e: anyhow::Error) -> TransferError {
    TransferError::Backend(format!("{:#}", e))
}

#[async_trait]
impl Transfer for BackendTransfer {
    async fn download(
        &self,
        oid: &Oid,
        size: u64,
        progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<DownloadStream> {
        let key = oid.to_hex();
        debug!(oid = %oid, size, "Downloading object");

        let stream = match self.backend.open_read(&key).await {
            Ok(stream) => stream,
            Err(e) if e.to_string().contains("object not found") => {
                return Err(TransferError::NotFound(*oid))
            }
            Err(e) => return Err(backend_error(e)),
        };

        if let Some(progress) = progress {
            progress(0, size);
        }
        Ok(stream)
    }

    async fn upload(
        &self,
        oid: &Oid,
        size: u64,
        source: &Path,
        progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<UploadAck> {
        let key = oid.to_hex();

        if self.backend.exists(&key).await.map_err(backend_error)? {
            debug!(oid = %oid, "Remote already has object");
            if let Some(progress) = progress {
                progress(size, size);
            }
            return Ok(UploadAck {
                oid: *oid,
                size,
                already_present: true,
            });
        }

        let actual = tokio::fs::metadata(source).await?.len();
        if actual != size {
            return Err(TransferError::SizeMismatch {
                oid: *oid,
                expected: size,
                actual,
            });
        }

        if let Some(progress) = progress {
            progress(0, size);
        }
        self.backend
            .put_file(&key, source)
            .await
            .map_err(backend_error)?;
        if let Some(progress) = progress {
            progress(size, size);
        }
        debug!(oid = %oid, size, "Uploaded object");

        Ok(UploadAck {
            oid: *oid,
            size,
            already_present: false,
        })
    }
}

/// Transfer used when no remote is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransfer;

#[async_trait]
impl Transfer for NoTransfer {
    async fn download(
        &self,
        _oid: &Oid,
        _size: u64,
        _progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<DownloadStream> {
        Err(TransferError::NoRemote)
    }

    async fn upload(
        &self,
        _oid: &Oid,
        _size: u64,
        _source: &Path,
        _progress: Option<&ProgressFn<'_>>,
    ) -> TransferResult<UploadAck> {
        Err(TransferError::NoRemote)
    }
}
