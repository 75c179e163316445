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

//! Clean and smudge transforms
//!
//! - **Clean** (`git add`): content → object store → pointer
//! - **Smudge** (`git checkout`): pointer → object store (downloading on
//!   demand) → content
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bigfile_git::{FilterConfig, FilterDriver, NoTransfer};
//! use bigfile_storage::ObjectStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = ObjectStore::open(".git/bigfile").await?;
//! let driver = FilterDriver::new(FilterConfig::default(), store, Arc::new(NoTransfer));
//!
//! let pointer = driver.clean(&b"0123456789"[..], "digits.bin", Some(10)).await?;
//! assert_eq!(pointer.size, 10);
//! # Ok(())
//! # }
//! ```

use crate::error::{TransferError, TransformError, TransformResult};
use crate::extension::{Extension, ExtensionRegistry};
use crate::pointer::{Pointer, PointerExtension, MAX_POINTER_SIZE};
use crate::policy::PathFilter;
use crate::progress::{ProgressLog, ProgressReader};
use crate::transfer::Transfer;
use bigfile_storage::{ObjectStore, StorageError, TempObject};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, warn};

/// Transform policy, fixed for the lifetime of a driver
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Paths whose content may be downloaded on smudge
    pub fetch_filter: PathFilter,

    /// Never download on smudge; leave pointers in the working tree
    pub skip_smudge: bool,

    /// Answer a failed download with the pointer instead of failing the session
    pub skip_download_errors: bool,

    /// Where clean and download append progress lines
    pub progress: Option<Arc<ProgressLog>>,
}

/// Result of a smudge
#[derive(Debug)]
pub enum SmudgeOutput {
    /// Input was not a pointer; the caller forwards the input unchanged
    PassThrough,
    /// The empty pointer; content is zero bytes
    Empty,
    /// Download declined; the caller emits the pointer's own encoding
    Pointer(Pointer),
    /// Content is the stored object itself
    Object {
        /// Canonical object path
        path: PathBuf,
        /// Object size
        size: u64,
    },
    /// Content was rebuilt through extensions into a temporary file
    Restored {
        /// Temporary file holding the content, removed on drop
        file: TempPath,
        /// Content size
        size: u64,
    },
}

impl SmudgeOutput {
    /// Number of bytes [`write_to`](Self::write_to) produces
    pub fn len(&self) -> u64 {
        match self {
            SmudgeOutput::PassThrough | SmudgeOutput::Empty => 0,
            SmudgeOutput::Pointer(pointer) => pointer.encode().len() as u64,
            SmudgeOutput::Object { size, .. } | SmudgeOutput::Restored { size, .. } => *size,
        }
    }

    /// Whether the output carries no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write exactly [`len`](Self::len) bytes of output
    ///
    /// Pass-through writes nothing; the caller owns the original input.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self {
            SmudgeOutput::PassThrough | SmudgeOutput::Empty => Ok(0),
            SmudgeOutput::Pointer(pointer) => {
                let bytes = pointer.encode();
                tokio::io::AsyncWriteExt::write_all(writer, &bytes).await?;
                Ok(bytes.len() as u64)
            }
            SmudgeOutput::Object { path, size } => copy_exact(path, *size, writer).await,
            SmudgeOutput::Restored { file, size } => copy_exact(file, *size, writer).await,
        }
    }
}

async fn copy_exact<W>(path: &Path, size: u64, writer: &mut W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let file = tokio::fs::File::open(path).await?;
    let copied = tokio::io::copy(&mut file.take(size), writer).await?;
    if copied != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank to {} bytes, expected {}", path.display(), copied, size),
        ));
    }
    Ok(copied)
}

/// Clean/smudge engine over a local object store and a remote transfer
#[derive(Debug, Clone)]
pub struct FilterDriver {
    config: FilterConfig,
    store: ObjectStore,
    transfer: Arc<dyn Transfer>,
    extensions: ExtensionRegistry,
}

impl FilterDriver {
    /// Creates a driver without extensions
    pub fn new(config: FilterConfig, store: ObjectStore, transfer: Arc<dyn Transfer>) -> Self {
        Self {
            config,
            store,
            transfer,
            extensions: ExtensionRegistry::default(),
        }
    }

    /// Use these extensions on clean (and to undo them on smudge)
    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    /// Returns a reference to the transform policy
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Returns the local object store
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Whether smudging `filename` may download its object
    pub fn download_allowed(&self, filename: &str) -> bool {
        !self.config.skip_smudge && self.config.fetch_filter.allows(filename)
    }

    /// Content → pointer
    ///
    /// Input that already decodes as a pointer is returned as-is without
    /// touching the store. `known_size` is the size of the working-tree file
    /// when the caller knows it; it is only used for diagnostics.
    pub async fn clean<R>(&self, mut reader: R, filename: &str, known_size: Option<u64>) -> TransformResult<Pointer>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = Vec::with_capacity(MAX_POINTER_SIZE + 1);
        (&mut reader)
            .take(MAX_POINTER_SIZE as u64 + 1)
            .read_to_end(&mut head)
            .await?;

        if head.len() <= MAX_POINTER_SIZE {
            if let Ok(pointer) = Pointer::decode(&head) {
                debug!(filename, oid = %pointer.oid, "Content is already a pointer");
                return Ok(pointer);
            }
        }

        let report = self.config.progress.as_ref().map(|log| log.reporter("clean", filename));
        let source = ProgressReader::new(
            std::io::Cursor::new(head).chain(reader),
            known_size.unwrap_or(0),
            report.as_deref(),
        );
        let staged = self.store.put(source, None).await?;
        if let Some(report) = report.as_deref().filter(|_| known_size != Some(staged.size())) {
            report(staged.size(), staged.size());
        }
        if let Some(known) = known_size {
            if known != staged.size() {
                warn!(filename, known, read = staged.size(), "Content size differs from file size");
            }
        }

        if self.extensions.is_empty() {
            let pointer = Pointer::new(*staged.oid(), staged.size());
            self.store.commit(staged, false).await?;
            info!(filename, oid = %pointer.oid, size = pointer.size, "Cleaned");
            return Ok(pointer);
        }

        let mut records = Vec::with_capacity(self.extensions.ordered().len());
        let mut current = staged;
        for extension in self.extensions.ordered() {
            records.push(PointerExtension::new(
                extension.name(),
                extension.priority(),
                *current.oid(),
            ));
            let output = self
                .run_extension(Arc::clone(extension), Stage::Clean, current.path(), filename)
                .await?;
            current = self.store.adopt(output).await?;
        }

        let pointer = Pointer::new(*current.oid(), current.size()).with_extensions(records);
        self.store.commit(current, true).await?;
        info!(
            filename,
            oid = %pointer.oid,
            size = pointer.size,
            extensions = pointer.extensions.len(),
            "Cleaned"
        );
        Ok(pointer)
    }

    /// Pointer → content
    ///
    /// Non-pointer input yields [`SmudgeOutput::PassThrough`]. A missing
    /// object is first looked up in alternates, then downloaded when
    /// `allow_download` is set; otherwise the pointer is handed back.
    pub async fn smudge<R>(&self, reader: R, filename: &str, allow_download: bool) -> TransformResult<SmudgeOutput>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = Vec::with_capacity(MAX_POINTER_SIZE + 1);
        reader
            .take(MAX_POINTER_SIZE as u64 + 1)
            .read_to_end(&mut head)
            .await?;

        let pointer = match Pointer::decode(&head) {
            Ok(pointer) => pointer,
            Err(e) => {
                debug!(filename, reason = %e, "Not a pointer, passing through");
                return Ok(SmudgeOutput::PassThrough);
            }
        };
        if pointer.is_empty_content() {
            return Ok(SmudgeOutput::Empty);
        }

        let present = self.store.contains(&pointer.oid).await?
            || self
                .store
                .link_from_alternates(&pointer.oid, pointer.size)
                .await?;
        if !present {
            if !allow_download {
                debug!(filename, oid = %pointer.oid, "Download declined, leaving pointer");
                return Ok(SmudgeOutput::Pointer(pointer));
            }
            self.download(&pointer, filename).await?;
        }

        let path = self.store.get(&pointer.oid).await?;
        if pointer.extensions.is_empty() {
            let size = tokio::fs::metadata(&path).await?.len();
            debug!(filename, oid = %pointer.oid, size, "Smudged");
            return Ok(SmudgeOutput::Object { path, size });
        }

        let restored = self.reverse_extensions(&pointer, &path, filename).await?;
        let size = restored.size();
        debug!(filename, oid = %pointer.oid, size, "Smudged through extensions");
        Ok(SmudgeOutput::Restored {
            file: restored.into_temp_path(),
            size,
        })
    }

    /// Fetch a pointer's object into the local store
    ///
    /// The remote stream is cut one byte past the pointer's size so an
    /// oversized object fails the size check without being read to the end.
    async fn download(&self, pointer: &Pointer, filename: &str) -> TransformResult<()> {
        let oid = pointer.oid;
        let failed = |source: TransferError| TransformError::Download { oid, source };

        info!(oid = %oid, size = pointer.size, "Downloading object");
        let report = self.config.progress.as_ref().map(|log| log.reporter("download", filename));
        let stream = self
            .transfer
            .download(&oid, pointer.size, report.as_deref())
            .await
            .map_err(failed)?;
        let stream = ProgressReader::new(
            stream.take(pointer.size.saturating_add(1)),
            pointer.size,
            report.as_deref(),
        );

        let staged = match self.store.put(stream, Some(pointer.size)).await {
            Ok(staged) => staged,
            Err(StorageError::SizeMismatch { expected, actual }) => {
                return Err(failed(TransferError::SizeMismatch {
                    oid,
                    expected,
                    actual,
                }))
            }
            Err(StorageError::Io(e)) => return Err(failed(TransferError::Io(e))),
            Err(e) => return Err(e.into()),
        };
        if *staged.oid() != oid {
            return Err(failed(TransferError::Corrupt {
                expected: oid,
                actual: *staged.oid(),
            }));
        }

        self.store
            .commit(staged, !pointer.extensions.is_empty())
            .await?;
        Ok(())
    }

    /// Undo a pointer's extensions, highest priority first, checking every stage
    async fn reverse_extensions(&self, pointer: &Pointer, object: &Path, filename: &str) -> TransformResult<TempObject> {
        let mut current: Option<TempObject> = None;

        for record in pointer.extensions.iter().rev() {
            let extension = self
                .extensions
                .get(&record.name)
                .ok_or_else(|| TransformError::UnknownExtension(record.name.clone()))?;

            let input = current.as_ref().map(|t| t.path()).unwrap_or(object);
            let output = self
                .run_extension(extension, Stage::Smudge, input, filename)
                .await?;
            let stage = self.store.adopt(output).await?;

            if *stage.oid() != record.oid {
                return Err(TransformError::Corrupt {
                    expected: record.oid,
                    actual: *stage.oid(),
                });
            }
            current = Some(stage);
        }

        // Records are non-empty here, so at least one stage ran
        current.ok_or_else(|| TransformError::UnknownExtension(String::new()))
    }

    async fn run_extension(
        &self,
        extension: Arc<dyn Extension>,
        stage: Stage,
        input: &Path,
        filename: &str,
    ) -> TransformResult<TempPath> {
        let scratch = self.store.scratch_file()?;
        let input = input.to_path_buf();
        let filename = filename.to_string();
        let name = extension.name().to_string();
        let failed = |message: String| TransformError::Extension {
            name: name.clone(),
            message,
        };

        let joined = tokio::task::spawn_blocking(move || -> io::Result<TempPath> {
            let mut source = std::fs::File::open(&input)?;
            let (file, path) = scratch.into_parts();
            let mut sink = io::BufWriter::new(file);
            match stage {
                Stage::Clean => extension.clean(&filename, &mut source, &mut sink)?,
                Stage::Smudge => extension.smudge(&filename, &mut source, &mut sink)?,
            }
            sink.flush()?;
            Ok(path)
        })
        .await
        .map_err(|e| failed(e.to_string()))?;

        joined.map_err(|e| failed(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Clean,
    Smudge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ZstdExtension;
    use crate::transfer::{BackendTransfer, NoTransfer};
    use bigfile_storage::mock::MockBackend;
    use bigfile_storage::{Oid, StorageBackend};
    use tempfile::TempDir;

    async fn setup(config: FilterConfig) -> (TempDir, FilterDriver) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::open(temp_dir.path()).await.unwrap();
        (temp_dir, FilterDriver::new(config, store, Arc::new(NoTransfer)))
    }

    async fn content(output: &SmudgeOutput) -> Vec<u8> {
        let mut out = Vec::new();
        let written = output.write_to(&mut out).await.unwrap();
        assert_eq!(written, output.len());
        out
    }

    #[tokio::test]
    async fn test_clean_stores_object() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = driver.clean(&b"0123456789"[..], "a.bin", Some(10)).await.unwrap();

        assert_eq!(pointer.size, 10);
        assert_eq!(pointer.oid, Oid::hash(b"0123456789"));
        assert!(driver.store().contains(&pointer.oid).await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_pointer_is_idempotent() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = Pointer::new(Oid::hash(b"elsewhere"), 9);
        let encoded = pointer.encode();

        let cleaned = driver.clean(&encoded[..], "a.bin", None).await.unwrap();
        assert_eq!(cleaned, pointer);
        assert!(driver.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_large_input_past_peek() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let data: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
        let pointer = driver.clean(&data[..], "big.bin", None).await.unwrap();
        assert_eq!(pointer.oid, Oid::hash(&data));
        assert_eq!(pointer.size, 10_000);
    }

    #[tokio::test]
    async fn test_clean_empty_file() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = driver.clean(&b""[..], "empty", Some(0)).await.unwrap();
        assert!(pointer.is_empty());
        assert!(pointer.encode().is_empty());
    }

    #[tokio::test]
    async fn test_smudge_local_object() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = driver.clean(&b"stored content"[..], "a.bin", None).await.unwrap();

        let output = driver.smudge(&pointer.encode()[..], "a.bin", false).await.unwrap();
        assert!(matches!(output, SmudgeOutput::Object { size: 14, .. }));
        assert_eq!(content(&output).await, b"stored content");
    }

    #[tokio::test]
    async fn test_smudge_pass_through() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let output = driver.smudge(&b"not a pointer"[..], "a.txt", true).await.unwrap();
        assert!(matches!(output, SmudgeOutput::PassThrough));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_smudge_empty_pointer() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let output = driver.smudge(&b""[..], "empty", true).await.unwrap();
        assert!(matches!(output, SmudgeOutput::Empty));
    }

    #[tokio::test]
    async fn test_smudge_declined_returns_pointer() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let pointer = Pointer::new(Oid::hash(b"remote only"), 11);

        let output = driver.smudge(&pointer.encode()[..], "a.bin", false).await.unwrap();
        assert_eq!(content(&output).await, pointer.encode());
    }

    #[tokio::test]
    async fn test_smudge_downloads_once() {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::open(temp_dir.path()).await.unwrap();
        let remote = MockBackend::new();
        let oid = Oid::hash(b"0123456789");
        remote.put(&oid.to_hex(), b"0123456789").await.unwrap();
        let driver = FilterDriver::new(
            FilterConfig::default(),
            store,
            Arc::new(BackendTransfer::new(Arc::new(remote.clone()))),
        );
        let encoded = Pointer::new(oid, 10).encode();

        let first = driver.smudge(&encoded[..], "a.bin", true).await.unwrap();
        assert_eq!(content(&first).await, b"0123456789");
        assert_eq!(remote.read_count(), 1);

        let second = driver.smudge(&encoded[..], "a.bin", true).await.unwrap();
        assert_eq!(content(&second).await, b"0123456789");
        assert_eq!(remote.read_count(), 1);
    }

    #[tokio::test]
    async fn test_smudge_corrupt_download_not_stored() {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::open(temp_dir.path()).await.unwrap();
        let remote = MockBackend::new();
        let oid = Oid::hash(b"0123456789");
        remote.put(&oid.to_hex(), b"9876543210").await.unwrap();
        let driver = FilterDriver::new(
            FilterConfig::default(),
            store,
            Arc::new(BackendTransfer::new(Arc::new(remote))),
        );

        let err = driver
            .smudge(&Pointer::new(oid, 10).encode()[..], "a.bin", true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Download { source: TransferError::Corrupt { .. }, .. }
        ));
        assert!(!driver.store().contains(&oid).await.unwrap());
    }

    #[tokio::test]
    async fn test_smudge_download_failure() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let err = driver
            .smudge(&Pointer::new(Oid::hash(b"x"), 1).encode()[..], "a.bin", true)
            .await
            .unwrap_err();
        assert!(err.is_download());
    }

    #[tokio::test]
    async fn test_oversized_download_cut_short() {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::open(temp_dir.path()).await.unwrap();
        let remote = MockBackend::new();
        let oid = Oid::hash(b"0123456789");
        remote.put(&oid.to_hex(), &[b'x'; 4096]).await.unwrap();
        let driver = FilterDriver::new(
            FilterConfig::default(),
            store,
            Arc::new(BackendTransfer::new(Arc::new(remote))),
        );

        let err = driver
            .smudge(&Pointer::new(oid, 10).encode()[..], "a.bin", true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Download {
                source: TransferError::SizeMismatch {
                    expected: 10,
                    actual: 11,
                    ..
                },
                ..
            }
        ));
        assert!(!driver.store().contains(&oid).await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_lines_for_clean_and_download() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("progress");
        let config = FilterConfig {
            progress: Some(Arc::new(ProgressLog::open(&log_path).unwrap())),
            ..FilterConfig::default()
        };

        let local = ObjectStore::open(temp_dir.path().join("local")).await.unwrap();
        let cleaner = FilterDriver::new(config.clone(), local, Arc::new(NoTransfer));
        let pointer = cleaner.clean(&b"0123456789"[..], "in.bin", Some(10)).await.unwrap();

        let remote = MockBackend::new();
        remote.put(&pointer.oid.to_hex(), b"0123456789").await.unwrap();
        let other = ObjectStore::open(temp_dir.path().join("other")).await.unwrap();
        let fetcher = FilterDriver::new(config, other, Arc::new(BackendTransfer::new(Arc::new(remote))));
        let output = fetcher.smudge(&pointer.encode()[..], "out.bin", true).await.unwrap();
        assert_eq!(content(&output).await, b"0123456789");

        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            vec!["clean 10/10 in.bin", "download 0/10 out.bin", "download 10/10 out.bin"]
        );
    }

    #[tokio::test]
    async fn test_download_allowed_policy() {
        let config = FilterConfig {
            fetch_filter: PathFilter::new(&["assets"], &["assets/raw"]).unwrap(),
            ..FilterConfig::default()
        };
        let (_dir, driver) = setup(config.clone()).await;
        assert!(driver.download_allowed("assets/a.png"));
        assert!(!driver.download_allowed("assets/raw/a.png"));
        assert!(!driver.download_allowed("docs/a.png"));

        let (_dir, skipping) = setup(FilterConfig {
            skip_smudge: true,
            ..config
        })
        .await;
        assert!(!skipping.download_allowed("assets/a.png"));
    }

    #[tokio::test]
    async fn test_extension_roundtrip() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let registry = ExtensionRegistry::new(vec![Arc::new(ZstdExtension::new(0, 3)) as Arc<dyn Extension>]).unwrap();
        let driver = driver.with_extensions(registry);
        let data = vec![b'z'; 32 * 1024];

        let pointer = driver.clean(&data[..], "z.bin", None).await.unwrap();
        assert_eq!(pointer.extensions.len(), 1);
        assert_eq!(pointer.extensions[0].oid, Oid::hash(&data));
        assert!(pointer.size < data.len() as u64);
        assert_eq!(std::fs::read_dir(driver.store().tmp_dir()).unwrap().count(), 0);

        let output = driver.smudge(&pointer.encode()[..], "z.bin", false).await.unwrap();
        assert!(matches!(output, SmudgeOutput::Restored { .. }));
        assert_eq!(content(&output).await, data);
    }

    #[tokio::test]
    async fn test_unknown_extension_on_smudge() {
        let (_dir, driver) = setup(FilterConfig::default()).await;
        let stored = driver.clean(&b"payload"[..], "a.bin", None).await.unwrap();
        let pointer = Pointer::new(stored.oid, stored.size)
            .with_extensions(vec![PointerExtension::new("rot13", 0, Oid::hash(b"x"))]);

        let err = driver.smudge(&pointer.encode()[..], "a.bin", false).await.unwrap_err();
        assert!(matches!(err, TransformError::UnknownExtension(name) if name == "rot13"));
    }
}
