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
use crate::output;
use crate::repo::BigfileRepo;
use anyhow::{Context, Result};
use bigfile_git::PointerScanner;
use bigfile_storage::Oid;
use clap::Parser;
use std::collections::BTreeSet;
use tracing::info;

/// Upload local objects to the configured remote directory
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Upload one object
    bigfile push 4d7a2146...

    # Upload every locally stored object referenced from HEAD
    bigfile push --all")]
pub struct PushCmd {
    /// Object ids to upload
    #[arg(value_name = "OID", required_unless_present = "all")]
    pub oids: Vec<String>,

    /// Upload every local object referenced from HEAD and the index
    #[arg(long)]
    pub all: bool,

    /// Quiet mode
    #[arg(short, long)]
    pub quiet: bool,
}

impl PushCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        if repo.config.remote.path.is_none() {
            anyhow::bail!("No remote configured; set remote.path in .git/bigfile/config.toml or BIGFILE_REMOTE_PATH");
        }
        let store = repo.open_store().await?;
        let transfer = repo.transfer().await?;
        let progress = repo.progress_log()?;

        let mut oids = BTreeSet::new();
        for hex in &self.oids {
            oids.insert(Oid::from_hex(hex).with_context(|| format!("Invalid object id: {}", hex))?);
        }
        if self.all {
            let pointers = PointerScanner::open(&repo.root)
                .and_then(|scanner| scanner.scan(&[]))
                .context("Failed to scan repository for pointers")?;
            for scanned in pointers {
                if store.contains(&scanned.pointer.oid).await? {
                    oids.insert(scanned.pointer.oid);
                }
            }
        }

        let mut uploaded = 0u64;
        let mut present = 0u64;
        for oid in &oids {
            let path = store
                .get(oid)
                .await
                .with_context(|| format!("Object {} is not stored locally", oid))?;
            let size = tokio::fs::metadata(&path).await?.len();
            let hex = oid.to_hex();
            let report = progress.as_ref().map(|log| log.reporter("push", &hex));
            let ack = transfer
                .upload(oid, size, &path, report.as_deref())
                .await
                .with_context(|| format!("Failed to upload {}", oid))?;

            if ack.already_present {
                present += 1;
            } else {
                uploaded += 1;
                if !self.quiet {
                    output::detail("Uploaded", &hex);
                }
            }
        }

        info!(uploaded, already_present = present, "Push complete");
        if !self.quiet {
            output::success(&format!(
                "{} object(s) uploaded, {} already on the remote",
                uploaded, present
            ));
        }
        Ok(())
    }
}
