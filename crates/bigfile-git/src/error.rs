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

//! Error types for pointer handling, transforms, transfers and the filter session

use bigfile_storage::{Oid, StorageError};
use std::io;
use thiserror::Error;

/// Result type for repository-level operations
pub type GitResult<T> = Result<T, GitError>;

/// Result type for pointer decoding
pub type PointerResult<T> = Result<T, PointerError>;

/// Result type for clean/smudge transforms
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for remote transfers
pub type TransferResult<T> = Result<T, TransferError>;

/// Result type for a filter session
pub type SessionResult<T> = Result<T, SessionError>;

/// Repository-level errors (git2, attributes, scanning, installation)
#[derive(Debug, Error)]
pub enum GitError {
    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Local object store error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Filter driver configuration conflict
    #[error("Filter driver already configured: {0}")]
    FilterConflict(String),

    /// .gitattributes configuration error
    #[error("Failed to configure .gitattributes: {0}")]
    GitattributesConfig(String),

    /// Repository not found
    #[error("Repository not initialized at path: {0}")]
    RepositoryNotFound(String),

    /// Invalid repository state
    #[error("Invalid repository state: {0}")]
    InvalidRepositoryState(String),
}

/// Pointer decoding failures
///
/// `NotAPointer` means the bytes are simply something else; callers pass the
/// input through unchanged. `Malformed` means the bytes claim to be a pointer
/// but break the format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// Input is not a pointer at all
    #[error("not a pointer: {0}")]
    NotAPointer(String),

    /// Input starts like a pointer but violates the format
    #[error("malformed pointer: {0}")]
    Malformed(String),
}

impl PointerError {
    /// Check if the input was not a pointer at all
    pub fn is_not_a_pointer(&self) -> bool {
        matches!(self, PointerError::NotAPointer(_))
    }
}

/// Remote transfer failures
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote does not have the object
    #[error("object {0} not found on remote")]
    NotFound(Oid),

    /// No remote is configured for this repository
    #[error("no remote configured")]
    NoRemote,

    /// The remote returned a different number of bytes than announced
    #[error("object {oid}: remote sent {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Object requested
        oid: Oid,
        /// Size from the pointer
        expected: u64,
        /// Bytes received
        actual: u64,
    },

    /// The remote sent bytes that do not hash to the requested oid
    #[error("object {expected} from remote is corrupt: content hashes to {actual}")]
    Corrupt {
        /// Object requested
        expected: Oid,
        /// Hash of the bytes received
        actual: Oid,
    },

    /// Backend-specific failure
    #[error("remote error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Clean/smudge failures
#[derive(Debug, Error)]
pub enum TransformError {
    /// Local object store error (including size inconsistencies)
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO error while streaming content
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Fetching the object from the remote failed
    #[error("error downloading object {oid}: {source}")]
    Download {
        /// Object that could not be fetched
        oid: Oid,
        /// Underlying transfer failure
        #[source]
        source: TransferError,
    },

    /// Bytes did not hash to the expected oid
    #[error("object {expected} is corrupt: content hashes to {actual}")]
    Corrupt {
        /// Oid the content should have
        expected: Oid,
        /// Oid the content actually has
        actual: Oid,
    },

    /// A pointer references an extension this process does not know
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// An extension process or codec failed
    #[error("extension {name} failed: {message}")]
    Extension {
        /// Extension name
        name: String,
        /// Failure description
        message: String,
    },
}

impl TransformError {
    /// Check if this is a download failure
    pub fn is_download(&self) -> bool {
        matches!(self, TransformError::Download { .. })
    }
}

/// Framing violations; always fatal to the session
#[derive(Debug, Error)]
pub enum ProtocolFault {
    /// Bad handshake line from the host
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Stream ended inside a record
    #[error("unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),

    /// Unrecognised operation identifier
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Length field could not be parsed
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// Filename longer than the allowed bound
    #[error("filename of {0} bytes exceeds limit")]
    NameTooLong(u64),

    /// Filename is not valid UTF-8
    #[error("filename is not valid UTF-8")]
    InvalidName,

    /// Declared payload larger than the configured bound
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Declared length
        len: u64,
        /// Configured bound
        max: u64,
    },

    /// Fewer payload bytes than declared were available
    #[error("payload truncated: declared {declared} bytes, received {received}")]
    Truncated {
        /// Declared length
        declared: u64,
        /// Bytes actually available
        received: u64,
    },

    /// Response does not fit the framing length field
    #[error("response of {0} bytes cannot be framed")]
    ResponseTooLarge(u64),
}

/// Fatal session errors, each mapped to a process exit status
#[derive(Debug, Error)]
pub enum SessionError {
    /// Framing violation
    #[error("protocol fault: {0}")]
    Protocol(#[from] ProtocolFault),

    /// Required download failed and download errors are not skipped
    #[error("error downloading object {oid} for {filename}: {source}")]
    Download {
        /// Object that could not be fetched
        oid: Oid,
        /// Advisory filename from the request
        filename: String,
        /// Underlying transfer failure
        #[source]
        source: TransferError,
    },

    /// Any other clean/smudge failure
    #[error("error processing {filename}: {source}")]
    Transform {
        /// Advisory filename from the request
        filename: String,
        /// Underlying failure
        #[source]
        source: TransformError,
    },

    /// IO error on the session transport
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Process exit status for this error
    ///
    /// `2` for a required download that failed, `3` for a protocol fault and
    /// `1` for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Download { .. } => 2,
            SessionError::Protocol(_) => 3,
            SessionError::Transform { .. } | SessionError::Io(_) => 1,
        }
    }
}
