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
//! Register the filter driver and manage tracked patterns

use crate::output;
use crate::repo::BigfileRepo;
use anyhow::{Context, Result};
use bigfile_git::install::{self, InstallOptions};
use clap::Args;

#[derive(Debug, Args)]
pub struct InstallCmd {
    /// Leave pointers in the working tree on checkout
    #[arg(long)]
    pub skip_smudge: bool,

    /// Replace a different existing filter configuration
    #[arg(short, long)]
    pub force: bool,
}

impl InstallCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        let options = InstallOptions {
            skip_smudge: self.skip_smudge,
            force: self.force,
            ..InstallOptions::default()
        };

        install::install(&repo.root, &options).context("Failed to install filter driver")?;

        output::success("Filter driver installed");
        for (key, value) in options.entries() {
            output::detail(&key, &value);
        }
        println!();
        println!("Next: bigfile track '<PATTERN>' to route files through the filter");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct UninstallCmd {}

impl UninstallCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        install::uninstall(&repo.root).context("Failed to remove filter driver")?;
        output::success("Filter driver removed");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct TrackCmd {
    /// File patterns to track (e.g., "*.psd", "assets/**")
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,
}

impl TrackCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;

        if self.patterns.is_empty() {
            let tracked = install::tracked_patterns(&repo.root)?;
            if tracked.is_empty() {
                output::info("No tracked patterns");
            } else {
                output::header("Tracked patterns:");
                for pattern in tracked {
                    println!("  {}", pattern);
                }
            }
            return Ok(());
        }

        for pattern in &self.patterns {
            if install::track_pattern(&repo.root, pattern)? {
                output::success(&format!("Tracking {}", pattern));
            } else {
                output::info(&format!("{} already tracked", pattern));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct UntrackCmd {
    /// File patterns to stop tracking
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,
}

impl UntrackCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;
        for pattern in &self.patterns {
            if install::untrack_pattern(&repo.root, pattern)? {
                output::success(&format!("No longer tracking {}", pattern));
            } else {
                output::info(&format!("{} was not tracked", pattern));
            }
        }
        Ok(())
    }
}
