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
//! Configuration for bigfile
//!
//! Settings live in `<git-dir>/bigfile/config.toml` (YAML and JSON are also
//! accepted). A missing file means defaults. `BIGFILE_*` environment variables
//! override file values, and every loaded configuration is validated before use.
//!
//! # Example
//!
//! ```no_run
//! use bigfile_config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(".git").await?;
//!
//!     println!("skip smudge: {}", config.filter.skip_smudge);
//!     println!("extensions: {}", config.extensions.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, ENV_OVERRIDES};
pub use schema::*;
pub use validation::{is_valid_extension_name, Validator, MAX_EXTENSION_PRIORITY};
