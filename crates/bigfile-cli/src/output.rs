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
//! Console output helpers for interactive commands.
//!
//! Filter commands never use these: their stdout belongs to the host.
//!
//! # Examples
//!
//! ```ignore
//! output::success("Filter driver installed");
//! output::detail("Store", ".git/bigfile");
//! ```

use console::style;

/// Print a success message with a green checkmark.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message to stderr with a red cross.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print an informational message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").cyan(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠").yellow(), msg);
}

/// Print a detail line with key-value formatting.
///
/// The key is displayed in regular text, and the value is highlighted in cyan.
pub fn detail(key: &str, value: &str) {
    println!("  {}: {}", key, style(value).cyan());
}

/// Print a bold section header.
pub fn header(msg: &str) {
    println!("{}", style(msg).bold());
}
