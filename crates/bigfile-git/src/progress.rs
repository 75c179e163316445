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

//! Transfer progress lines
//!
//! When a progress file is configured, clean, download and push append one
//! line per step:
//!
//! ```text
//! <op> <done>/<total> <filename>
//! ```
//!
//! Another process (an IDE, a wrapper script) can tail the file while Git
//! drives the filter. `total` is 0 when the size is not known up front.

use crate::transfer::ProgressFn;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::warn;

/// Smallest advance between two lines for the same file (bytes)
pub const PROGRESS_STEP: u64 = 1024 * 1024;

const NOTHING_WRITTEN: u64 = u64::MAX;

/// Append-only progress file shared by every transfer of a process
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ProgressLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the progress file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn record(&self, op: &str, done: u64, total: u64, filename: &str) -> io::Result<()> {
        let line = format!("{} {}/{} {}\n", op, done, total, filename);
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("progress file lock poisoned"))?;
        file.write_all(line.as_bytes())
    }

    /// Callback recording `op` for `filename`
    ///
    /// Repeated counts are dropped and intermediate counts are written at
    /// most once per [`PROGRESS_STEP`]; the first and the final count always
    /// land. Write failures are logged and otherwise ignored.
    pub fn reporter<'a>(&'a self, op: &'a str, filename: &'a str) -> Box<ProgressFn<'a>> {
        let last = AtomicU64::new(NOTHING_WRITTEN);
        Box::new(move |done, total| {
            let prev = last.load(Ordering::Relaxed);
            let finished = total > 0 && done >= total;
            let due = prev == NOTHING_WRITTEN || finished || done.saturating_sub(prev) >= PROGRESS_STEP;
            if done == prev || !due {
                return;
            }
            last.store(done, Ordering::Relaxed);
            if let Err(e) = self.record(op, done, total, filename) {
                warn!(path = %self.path.display(), error = %e, "Failed to write progress");
            }
        })
    }
}

/// Reader reporting the running byte count after every read
pub struct ProgressReader<'p, R> {
    inner: R,
    done: u64,
    total: u64,
    report: Option<&'p ProgressFn<'p>>,
}

impl<'p, R> ProgressReader<'p, R> {
    /// Wrap `inner`; `total` is the expected size, or 0 when unknown
    pub fn new(inner: R, total: u64, report: Option<&'p ProgressFn<'p>>) -> Self {
        Self {
            inner,
            done: 0,
            total,
            report,
        }
    }

    /// Bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.done
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<'_, R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = (buf.filled().len() - before) as u64;
        if read > 0 {
            this.done += read;
            if let Some(report) = this.report {
                report(this.done, this.total);
            }
        }
        Poll::Ready(Ok(()))
    }
}
