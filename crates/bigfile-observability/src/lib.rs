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
//! Structured logging for bigfile
//!
//! Filter commands speak a binary protocol on stdout, so every log line goes
//! to stderr regardless of format.
//!
//! # Example
//!
//! ```no_run
//! use bigfile_observability::{init_tracing, LogFormat};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing(LogFormat::Compact, Some("info"))?;
//!     tracing::info!("filter started");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod initialization;

pub use config::{LogConfig, LogError, LogFormat, DEFAULT_LEVEL, LOG_ENV_VAR};
pub use initialization::{init_tracing, init_tracing_with_config};
