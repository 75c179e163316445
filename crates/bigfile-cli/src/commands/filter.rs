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
//! Persistent filter session on stdin/stdout

use crate::repo::BigfileRepo;
use anyhow::Result;
use bigfile_git::{FilterSession, SessionConfig};
use clap::Args;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Serve clean/smudge requests from the host over stdin/stdout
///
/// The session writes a handshake offer, waits for the host's reply and then
/// answers requests in order until end of input or the end marker.
#[derive(Debug, Args)]
#[command(after_help = "EXIT STATUS:
    0  session ended normally, was rejected, or was interrupted
    1  storage or I/O failure
    2  a required download failed
    3  protocol violation")]
pub struct FilterCmd {
    /// Never download on smudge; missing objects stay pointers
    #[arg(long)]
    pub skip: bool,
}

impl FilterCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        let driver = repo.driver(self.skip).await?;

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupt received, finishing current request");
                on_signal.cancel();
            }
        });

        let config = SessionConfig {
            max_payload_size: repo.config.filter.max_payload_size,
            cancel,
        };
        let mut session = FilterSession::new(
            driver,
            config,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        );

        let summary = session.run().await?;
        info!(
            outcome = ?summary.outcome,
            cleaned = summary.cleaned,
            smudged = summary.smudged,
            "Filter session finished"
        );
        Ok(())
    }
}
