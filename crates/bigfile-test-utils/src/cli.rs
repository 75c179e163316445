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

//! CLI command helpers for testing the bigfile binary.

use assert_cmd::Command;
use std::path::Path;

/// Creates a new bigfile Command for testing.
///
/// Variables from the outer environment that change filter behavior are
/// cleared so output is deterministic.
///
/// # Example
/// ```ignore
/// use bigfile_test_utils::bigfile;
///
/// bigfile()
///     .arg("version")
///     .assert()
///     .success();
/// ```
#[allow(deprecated)] // cargo_bin is deprecated but still works for our use case
pub fn bigfile() -> Command {
    let mut cmd = Command::cargo_bin("bigfile").expect("bigfile binary not found");
    for var in [
        "RUST_LOG",
        "BIGFILE_LOG",
        "BIGFILE_LOG_LEVEL",
        "BIGFILE_SKIP_SMUDGE",
        "BIGFILE_SKIP_DOWNLOAD_ERRORS",
        "BIGFILE_PROGRESS",
        "BIGFILE_FETCH_INCLUDE",
        "BIGFILE_FETCH_EXCLUDE",
        "BIGFILE_REMOTE_PATH",
        "GIT_LFS_SKIP_SMUDGE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Fluent API wrapper for common bigfile command patterns.
pub struct BigfileCommand {
    cmd: Command,
}

impl BigfileCommand {
    /// Create a new BigfileCommand.
    pub fn new() -> Self {
        Self { cmd: bigfile() }
    }

    /// Set the working directory for the command.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    /// Add multiple arguments to the command.
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    /// Set an environment variable for the command.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Feed bytes on stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.cmd.write_stdin(input.into());
        self
    }

    /// Execute the command and assert success.
    pub fn run_success(mut self) -> assert_cmd::assert::Assert {
        self.cmd.assert().success()
    }

    /// Execute the command and assert failure.
    pub fn run_failure(mut self) -> assert_cmd::assert::Assert {
        self.cmd.assert().failure()
    }

    /// Execute the command and assert a specific exit status.
    pub fn run_with_code(mut self, code: i32) -> assert_cmd::assert::Assert {
        self.cmd.assert().code(code)
    }

    /// Get the underlying Command for custom assertions.
    pub fn into_inner(self) -> Command {
        self.cmd
    }

    /// Run single-shot clean in `dir` and return stdout.
    pub fn clean(dir: &Path, filename: &str, content: &[u8]) -> Vec<u8> {
        Self::new()
            .in_dir(dir)
            .args(&["clean", "--", filename])
            .stdin(content)
            .run_success()
            .get_output()
            .stdout
            .clone()
    }

    /// Run single-shot smudge in `dir` and return stdout.
    pub fn smudge(dir: &Path, filename: &str, content: &[u8]) -> Vec<u8> {
        Self::new()
            .in_dir(dir)
            .args(&["smudge", "--", filename])
            .stdin(content)
            .run_success()
            .get_output()
            .stdout
            .clone()
    }
}

impl Default for BigfileCommand {
    fn default() -> Self {
        Self::new()
    }
}
