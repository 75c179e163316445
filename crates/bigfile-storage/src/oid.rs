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

//! Object Identifier (OID) for the content-addressable store
//!
//! An OID is the SHA-256 hash of an object's bytes. Its lowercase hex form is
//! both the object's file name in the store and its checksum.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::io::AsyncReadExt;

/// Length of an OID in hex characters
pub const OID_HEX_LEN: usize = 64;

/// Read buffer used by the streaming hash helpers
pub(crate) const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Object Identifier - SHA-256 hash of object content
///
/// # Examples
///
/// ```
/// use bigfile_storage::Oid;
///
/// let oid = Oid::hash(b"0123456789");
/// assert_eq!(oid.to_hex().len(), 64);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid([u8; 32]);

impl Oid {
    /// Hash an in-memory buffer
    pub fn hash(data: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(data).into())
    }

    /// The OID of zero bytes
    pub fn empty() -> Self {
        Self::hash(&[])
    }

    pub(crate) fn from_digest(bytes: [u8; 32]) -> Self {
        Oid(bytes)
    }

    /// Compute the OID of a file with a streaming hash (constant memory)
    pub async fn from_file_async<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let mut file = tokio::fs::File::open(path.as_ref()).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self::from_digest(hasher.finalize().into()))
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64 character lowercase hex string
    ///
    /// Uppercase digits are rejected: the hex form doubles as a file name and
    /// must have exactly one spelling.
    ///
    /// ```
    /// use bigfile_storage::Oid;
    ///
    /// let oid = Oid::hash(b"test");
    /// assert_eq!(Oid::from_hex(&oid.to_hex()).unwrap(), oid);
    /// assert!(Oid::from_hex(&oid.to_hex().to_uppercase()).is_err());
    /// ```
    pub fn from_hex(s: &str) -> StorageResult<Self> {
        if s.len() != OID_HEX_LEN {
            return Err(StorageError::invalid_oid(format!(
                "expected {} hex characters, got {}",
                OID_HEX_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(StorageError::invalid_oid(format!(
                "not lowercase hex: {}",
                s
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| StorageError::invalid_oid(e.to_string()))?;
        Ok(Oid(bytes))
    }

    /// Shard directories for this OID: first two and next two hex characters
    pub fn shards(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[0..2].to_string(), hex[2..4].to_string())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl FromStr for Oid {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Oid::from_hex(s)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Oid::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
