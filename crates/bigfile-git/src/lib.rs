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

//! # bigfile Git integration layer
//!
//! Large files are replaced in history by small pointers; their bytes live in
//! a local object store and are fetched from a remote on demand.
//!
//! ## Architecture
//!
//! - **Pointers** ([`pointer`]): the line-oriented text stored in Git
//! - **Transform engine** ([`transform`]): clean (content → pointer) and
//!   smudge (pointer → content), with optional [`extension`]s
//! - **Filter session** ([`session`], [`protocol`]): one long-lived process
//!   answering many clean/smudge requests over stdin/stdout
//! - **Integrity** ([`scanner`], [`fsck`]): pointers reachable from history
//!   checked against the object store
//! - **Installation** ([`install`]): filter driver config and `.gitattributes`
//!
//! ## Pointer format
//!
//! ```text
//! version https://git-lfs.github.com/spec/v1
//! oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393
//! size 12345
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bigfile_git::Pointer;
//! use bigfile_storage::Oid;
//!
//! let pointer = Pointer::new(Oid::hash(b"content"), 7);
//! let encoded = pointer.encode();
//! assert_eq!(Pointer::decode(&encoded)?, pointer);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod extension;
pub mod fsck;
pub mod install;
pub mod pointer;
pub mod policy;
pub mod progress;
pub mod protocol;
pub mod scanner;
pub mod session;
pub mod transfer;
pub mod transform;

pub use error::{
    GitError, GitResult, PointerError, ProtocolFault, SessionError, SessionResult, TransferError, TransformError,
    TransformResult,
};
pub use extension::{CommandExtension, Extension, ExtensionRegistry, ZstdExtension};
pub use fsck::{FsckChecker, FsckOptions, FsckReport};
pub use install::FILTER_DRIVER_NAME;
pub use pointer::{Pointer, PointerExtension, MAX_POINTER_SIZE};
pub use policy::PathFilter;
pub use progress::{ProgressLog, ProgressReader};
pub use protocol::{FrameCodec, Framing, Operation};
pub use scanner::{PointerScanner, ScannedPointer};
pub use session::{FilterSession, SessionConfig, SessionOutcome, SessionState, SessionSummary};
pub use transfer::{BackendTransfer, NoTransfer, Transfer, UploadAck};
pub use transform::{FilterConfig, FilterDriver, SmudgeOutput};
