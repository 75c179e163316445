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
use bigfile_git::fsck::{FsckChecker, FsckOptions, IssueSeverity};
use bigfile_git::PointerScanner;
use clap::Parser;
use console::style;

/// Check stored objects against the pointers in history and the index
///
/// Every object referenced from the given refs (default HEAD) and from the
/// staging index is hashed. Objects whose content does not match their name
/// are deleted so the next checkout fetches a good copy.
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Check everything reachable from HEAD
    bigfile fsck

    # Report without deleting corrupt objects
    bigfile fsck --dry-run

    # Check two branches and list unreferenced objects
    bigfile fsck --dangling main release")]
pub struct FsckCmd {
    /// Report corrupt objects without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Also list stored objects no pointer references
    #[arg(long)]
    pub dangling: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    pub quiet: bool,

    /// Refs to scan (defaults to HEAD)
    #[arg(value_name = "REF")]
    pub refs: Vec<String>,
}

impl FsckCmd {
    pub async fn execute(&self) -> Result<()> {
        let repo = BigfileRepo::current().await?;

        let pointers = PointerScanner::open(&repo.root)
            .and_then(|scanner| scanner.scan(&self.refs))
            .context("Failed to scan repository for pointers")?;

        if !self.quiet {
            output::info(&format!(
                "Checking {} pointer(s) against {}",
                pointers.len(),
                repo.store_path().display()
            ));
        }

        let checker = FsckChecker::new(repo.open_store().await?);
        let options = FsckOptions {
            dry_run: self.dry_run,
            check_dangling: self.dangling,
        };
        let report = checker.check(&pointers, &options).await?;

        for issue in &report.issues {
            if self.quiet && issue.severity != IssueSeverity::Error {
                continue;
            }
            let marker = match issue.severity {
                IssueSeverity::Error => style("error").red().bold(),
                IssueSeverity::Warning => style("warning").yellow(),
                IssueSeverity::Info => style("info").dim(),
            };
            match &issue.name {
                Some(name) => println!("{}: {} ({})", marker, issue.message, name),
                None => println!("{}: {}", marker, issue.message),
            }
            if issue.quarantined {
                println!("  {}", style("removed from the object store").dim());
            }
        }

        if !self.quiet {
            println!();
            output::detail("Objects checked", &report.objects_checked.to_string());
            output::detail("Corrupt", &report.corrupted_objects.to_string());
            output::detail("Missing", &report.missing_objects.to_string());
            if self.dangling {
                output::detail("Unreferenced", &report.dangling_objects.to_string());
            }
        }

        if report.has_errors() {
            anyhow::bail!("{} corrupt object(s) found", report.corrupted_objects);
        }
        if !self.quiet {
            if report.is_clean() {
                output::success("All referenced objects are present and intact");
            } else {
                output::warning("Some referenced objects are not stored locally");
            }
        }
        Ok(())
    }
}
