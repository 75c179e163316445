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

//! Content extensions
//!
//! An extension rewrites content on clean (before hashing and storing) and
//! undoes the rewrite on smudge. Extensions run in ascending priority on clean
//! and descending priority on smudge. Two kinds exist:
//!
//! - [`ZstdExtension`]: in-process zstd compression
//! - [`CommandExtension`]: external programs reading stdin and writing stdout,
//!   with `%f` in their arguments replaced by the file name

use crate::error::{TransformError, TransformResult};
use crate::pointer::{is_valid_extension_name, MAX_EXTENSION_PRIORITY};
use std::collections::HashSet;
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

/// A reversible content rewrite
///
/// Both directions are blocking; the transform engine runs them on the
/// blocking thread pool.
pub trait Extension: Send + Sync + Debug {
    /// Name recorded in pointers as `ext-<priority>-<name>`
    fn name(&self) -> &str;

    /// Pipeline position, 0..=9
    fn priority(&self) -> u8;

    /// Rewrite raw content
    fn clean(
        &self,
        filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()>;

    /// Undo [`clean`](Self::clean)
    fn smudge(
        &self,
        filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()>;
}

/// zstd compression
#[derive(Debug, Clone)]
pub struct ZstdExtension {
    priority: u8,
    level: i32,
}

impl ZstdExtension {
    /// Extension name used in pointers
    pub const NAME: &'static str = "zstd";

    /// Create with a compression level (0 selects the zstd default)
    pub fn new(priority: u8, level: i32) -> Self {
        Self { priority, level }
    }
}

impl Extension for ZstdExtension {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn clean(
        &self,
        _filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        zstd::stream::copy_encode(input, output, self.level)
    }

    fn smudge(
        &self,
        _filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        zstd::stream::copy_decode(input, output)
    }
}

/// External clean/smudge programs
#[derive(Debug, Clone)]
pub struct CommandExtension {
    name: String,
    priority: u8,
    clean_command: String,
    smudge_command: String,
}

impl CommandExtension {
    /// Create from command lines; arguments are split on whitespace
    pub fn new<S: Into<String>>(name: S, priority: u8, clean_command: S, smudge_command: S) -> Self {
        Self {
            name: name.into(),
            priority,
            clean_command: clean_command.into(),
            smudge_command: smudge_command.into(),
        }
    }

    fn run(
        &self,
        command_line: &str,
        filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        let mut parts = command_line
            .split_whitespace()
            .map(|arg| arg.replace("%f", filename));
        let program = parts.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("extension {} has an empty command", self.name),
            )
        })?;

        debug!(extension = %self.name, program = %program, "Running extension command");
        let mut child = Command::new(&program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin unavailable"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout unavailable"))?;

        let (fed, drained) = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || {
                let result = io::copy(input, &mut stdin);
                drop(stdin);
                result
            });
            let drained = io::copy(&mut stdout, output);
            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("extension input thread panicked")));
            (fed, drained)
        });

        let status = child.wait()?;
        drained?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}",
                program, status
            )));
        }
        // A program may legitimately stop reading early; only report a
        // broken feed if it also failed.
        match fed {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        }
    }
}

impl Extension for CommandExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn clean(
        &self,
        filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        self.run(&self.clean_command, filename, input, output)
    }

    fn smudge(
        &self,
        filename: &str,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> io::Result<()> {
        self.run(&self.smudge_command, filename, input, output)
    }
}

/// Configured extensions, ordered by priority
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    /// Validate and order a set of extensions
    ///
    /// # Errors
    ///
    /// Priorities must lie in 0..=9 and, like names, be unique. Names must be
    /// readable back from a pointer key (ASCII letters, digits, `_`).
    pub fn new(mut extensions: Vec<Arc<dyn Extension>>) -> TransformResult<Self> {
        let mut names = HashSet::new();
        let mut priorities = HashSet::new();

        for extension in &extensions {
            let invalid = |message: String| TransformError::Extension {
                name: extension.name().to_string(),
                message,
            };
            if !is_valid_extension_name(extension.name()) {
                return Err(invalid(
                    "name may only contain ASCII letters, digits and '_'".to_string(),
                ));
            }
            if extension.priority() > MAX_EXTENSION_PRIORITY {
                return Err(invalid(format!(
                    "priority {} is above {}",
                    extension.priority(),
                    MAX_EXTENSION_PRIORITY
                )));
            }
            if !priorities.insert(extension.priority()) {
                return Err(invalid(format!("priority {} is used twice", extension.priority())));
            }
            if !names.insert(extension.name().to_string()) {
                return Err(invalid("name is used twice".to_string()));
            }
        }

        extensions.sort_by_key(|e| e.priority());
        Ok(Self { extensions })
    }

    /// Extensions in ascending priority
    pub fn ordered(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    /// Look up an extension by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.iter().find(|e| e.name() == name).cloned()
    }

    /// Whether no extensions are configured
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
