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
//! Single-shot clean and smudge for hosts without session support

use crate::repo::BigfileRepo;
use anyhow::{Context, Result};
use bigfile_git::{Pointer, SessionError, SmudgeOutput, TransformError, MAX_POINTER_SIZE};
use clap::Args;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Convert file content on stdin into a pointer on stdout
#[derive(Debug, Args)]
pub struct CleanCmd {
    /// Path of the file being cleaned, relative to the repository root
    #[arg(value_name = "FILE")]
    pub file: Option<String>,
}

impl CleanCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        let driver = repo.driver(false).await?;
        let name = self.file.unwrap_or_default();

        let known_size = if name.is_empty() {
            None
        } else {
            tokio::fs::metadata(repo.root.join(&name)).await.ok().map(|m| m.len())
        };

        let pointer = driver
            .clean(tokio::io::stdin(), &name, known_size)
            .await
            .with_context(|| format!("Failed to clean {}", name))?;
        debug!(filename = %name, oid = %pointer.oid, size = pointer.size, "Cleaned");

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&pointer.encode()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Convert a pointer on stdin into file content on stdout
///
/// Input that is not a pointer is echoed unchanged.
#[derive(Debug, Args)]
pub struct SmudgeCmd {
    /// Never download; missing objects stay pointers
    #[arg(long)]
    pub skip: bool,

    /// Path of the file being smudged, relative to the repository root
    #[arg(value_name = "FILE")]
    pub file: Option<String>,
}

impl SmudgeCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        let driver = repo.driver(self.skip).await?;
        let name = self.file.unwrap_or_default();

        let mut stdin = tokio::io::stdin();
        let mut head = Vec::with_capacity(MAX_POINTER_SIZE + 1);
        (&mut stdin)
            .take(MAX_POINTER_SIZE as u64 + 1)
            .read_to_end(&mut head)
            .await?;

        let allow = driver.download_allowed(&name);
        let output = match driver.smudge(&head[..], &name, allow).await {
            Ok(output) => output,
            Err(TransformError::Download { oid, source }) => {
                if !driver.config().skip_download_errors {
                    return Err(SessionError::Download {
                        oid,
                        filename: name,
                        source,
                    }
                    .into());
                }
                warn!(filename = %name, oid = %oid, error = %source, "Download failed, leaving pointer");
                SmudgeOutput::Pointer(Pointer::decode(&head)?)
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to smudge {}", name)),
        };

        let mut stdout = tokio::io::stdout();
        if let SmudgeOutput::PassThrough = output {
            debug!(filename = %name, "Not a pointer, echoing input");
            stdout.write_all(&head).await?;
            tokio::io::copy(&mut stdin, &mut stdout).await?;
        } else {
            output.write_to(&mut stdout).await?;
        }
        stdout.flush().await?;
        Ok(())
    }
}
