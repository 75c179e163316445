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

//! Storage error types and utilities

use crate::oid::Oid;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found in storage
    #[error("object not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid key format (empty, contains invalid characters, etc.)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Malformed object identifier
    #[error("invalid oid: {0}")]
    InvalidOid(String),

    /// The streamed byte count did not match the size the caller announced
    #[error("size mismatch: expected {expected} bytes, read {actual}")]
    SizeMismatch {
        /// Size announced by the caller
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// An object with this oid already exists with a different size
    #[error("data inconsistency for {oid}: stored object is {existing} bytes, new content is {incoming} bytes ({path})")]
    Inconsistent {
        /// Object identifier
        oid: Oid,
        /// Size of the canonical object on disk
        existing: u64,
        /// Size of the content being committed
        incoming: u64,
        /// Canonical object path
        path: PathBuf,
    },

    /// Storage backend not available or misconfigured
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Transparent error delegation for wrapped error types
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Create a NotFound error with the given key
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        StorageError::NotFound(key.into())
    }

    /// Create an InvalidKey error with context
    pub fn invalid_key<S: Into<String>>(msg: S) -> Self {
        StorageError::InvalidKey(msg.into())
    }

    /// Create an InvalidOid error with context
    pub fn invalid_oid<S: Into<String>>(msg: S) -> Self {
        StorageError::InvalidOid(msg.into())
    }

    /// Create a Backend error with context
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        StorageError::Backend(msg.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Check if this is a data inconsistency fault
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, StorageError::Inconsistent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StorageError::not_found("test_key");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object not found: test_key");
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = StorageError::SizeMismatch { expected: 10, actual: 4 };
        assert_eq!(err.to_string(), "size mismatch: expected 10 bytes, read 4");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::other("read failed");
        let storage_err = StorageError::from(io_err);
        assert!(matches!(storage_err, StorageError::Io(_)));
    }
}
