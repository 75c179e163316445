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

//! # bigfile test utilities
//!
//! Shared helpers for integration tests:
//! - CLI command helpers for driving the `bigfile` binary
//! - Throwaway git repositories with the filter's state directory
//! - Host-side session scripts and response decoding
//! - Assertions over the object store

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod assertions;
pub mod cli;
pub mod fixtures;
pub mod repo;

// Re-export commonly used items at crate root
pub use assertions::*;
pub use cli::{bigfile, BigfileCommand};
pub use fixtures::SessionScript;
pub use repo::TestRepo;
