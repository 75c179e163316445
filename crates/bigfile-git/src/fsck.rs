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

//! Object store integrity check
//!
//! Cross-checks the local object store against a set of scanned pointers:
//! - **Missing objects**: referenced but not stored locally
//! - **Checksum verification**: stored bytes must hash to their name; corrupt
//!   objects are deleted so the next smudge fetches a good copy
//! - **Dangling objects** (optional): stored but referenced by no pointer
//!
//! # Examples
//!
//! ```no_run
//! use bigfile_git::fsck::{FsckChecker, FsckOptions};
//! use bigfile_git::scanner::PointerScanner;
//! use bigfile_storage::ObjectStore;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pointers = PointerScanner::open(Path::new("."))?.scan(&[])?;
//!     let store = ObjectStore::open(".git/bigfile").await?;
//!
//!     let report = FsckChecker::new(store).check(&pointers, &FsckOptions::default()).await?;
//!     println!("Issues found: {}", report.total_issues());
//!     Ok(())
//! }
//! ```

use crate::error::GitResult;
use crate::scanner::ScannedPointer;
use bigfile_storage::{ObjectStore, Oid};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Severity level of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    /// Informational only, not a problem
    Info,
    /// Repository works, but content is unavailable until fetched
    Warning,
    /// Stored data is wrong
    Error,
}

/// Category of issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    /// Object bytes do not hash to the object name
    ChecksumMismatch,
    /// Referenced object is not stored locally
    MissingObject,
    /// Stored object referenced by no scanned pointer
    DanglingObject,
}

/// An issue found by the checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsckIssue {
    /// Severity level
    pub severity: IssueSeverity,

    /// Issue category
    pub category: IssueCategory,

    /// Human-readable description
    pub message: String,

    /// Object involved
    pub oid: Oid,

    /// A file referencing the object, if any
    pub name: Option<String>,

    /// Whether the object was deleted from the store
    pub quarantined: bool,
}

impl FsckIssue {
    /// Create a new issue
    pub fn new(severity: IssueSeverity, category: IssueCategory, oid: Oid, message: String) -> Self {
        Self {
            severity,
            category,
            message,
            oid,
            name: None,
            quarantined: false,
        }
    }

    /// Set the file name associated with this issue
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }
}

/// Result of a check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsckReport {
    /// All issues found
    pub issues: Vec<FsckIssue>,

    /// Distinct objects checked
    pub objects_checked: u64,

    /// Objects whose bytes did not match their name
    pub corrupted_objects: u64,

    /// Referenced objects absent locally
    pub missing_objects: u64,

    /// Unreferenced objects
    pub dangling_objects: u64,

    /// Objects deleted from the store
    pub quarantined_objects: u64,
}

impl FsckReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue to the report
    pub fn add_issue(&mut self, issue: FsckIssue) {
        match issue.category {
            IssueCategory::ChecksumMismatch => self.corrupted_objects += 1,
            IssueCategory::MissingObject => self.missing_objects += 1,
            IssueCategory::DanglingObject => self.dangling_objects += 1,
        }
        if issue.quarantined {
            self.quarantined_objects += 1;
        }
        self.issues.push(issue);
    }

    /// Get total number of issues
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    /// Check if there are any critical errors
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Whether every referenced object is present and intact
    pub fn is_clean(&self) -> bool {
        self.corrupted_objects == 0 && self.missing_objects == 0
    }

    /// Get issues by category
    pub fn issues_by_category(&self, category: IssueCategory) -> Vec<&FsckIssue> {
        self.issues.iter().filter(|i| i.category == category).collect()
    }
}

/// Options for a check
#[derive(Debug, Clone, Default)]
pub struct FsckOptions {
    /// Report corrupt objects without deleting them
    pub dry_run: bool,

    /// Also report stored objects no pointer references
    pub check_dangling: bool,
}

/// Integrity checker over the local object store
#[derive(Debug, Clone)]
pub struct FsckChecker {
    store: ObjectStore,
}

impl FsckChecker {
    /// Create a checker
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    /// Check every distinct object referenced by `pointers`
    ///
    /// Never writes objects; deletes corrupt ones unless `dry_run` is set.
    pub async fn check(&self, pointers: &[ScannedPointer], options: &FsckOptions) -> GitResult<FsckReport> {
        info!(pointers = pointers.len(), dry_run = options.dry_run, "Starting integrity check");
        let mut report = FsckReport::new();
        let mut referenced = HashSet::new();

        for scanned in pointers {
            let oid = scanned.pointer.oid;
            if !referenced.insert(oid) {
                continue;
            }
            report.objects_checked += 1;

            if !self.store.contains(&oid).await? {
                debug!(oid = %oid, name = %scanned.name, "Object missing");
                report.add_issue(
                    FsckIssue::new(
                        IssueSeverity::Warning,
                        IssueCategory::MissingObject,
                        oid,
                        format!("object {} is not stored locally", oid),
                    )
                    .with_name(scanned.name.clone()),
                );
                continue;
            }

            if self.store.verify(&oid).await? {
                continue;
            }

            let mut issue = FsckIssue::new(
                IssueSeverity::Error,
                IssueCategory::ChecksumMismatch,
                oid,
                format!("object {} does not match its content hash", oid),
            )
            .with_name(scanned.name.clone());
            if options.dry_run {
                warn!(oid = %oid, name = %scanned.name, "Corrupt object (dry run, kept)");
            } else {
                issue.quarantined = self.store.remove(&oid).await?;
                warn!(oid = %oid, name = %scanned.name, "Corrupt object removed");
            }
            report.add_issue(issue);
        }

        if options.check_dangling {
            for oid in self.store.list().await? {
                if !referenced.contains(&oid) {
                    report.add_issue(FsckIssue::new(
                        IssueSeverity::Info,
                        IssueCategory::DanglingObject,
                        oid,
                        format!("object {} is not referenced", oid),
                    ));
                }
            }
        }

        info!(
            objects_checked = report.objects_checked,
            corrupted = report.corrupted_objects,
            missing = report.missing_objects,
            issues = report.total_issues(),
            "Integrity check complete"
        );
        Ok(report)
    }
}
