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

//! Pointer file encoding
//!
//! Pointer files replace large files in history. Each line is `key value`:
//!
//! ```text
//! version https://git-lfs.github.com/spec/v1
//! oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393
//! size 12345
//! ext-0-zstd sha256:84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882
//! x-origin build-farm
//! ```
//!
//! `oid` and `size` describe the object as stored (after any extensions).
//! `ext-<priority>-<name>` lines name the extensions applied on clean; their
//! oid is the hash of the bytes fed *into* that extension. Keys starting with
//! `x-` are optional and survive a decode/encode cycle untouched; any other
//! unknown key makes the pointer malformed.
//!
//! The empty file is its own pointer: it decodes to a zero-size pointer whose
//! encoding is again empty.

use crate::error::{PointerError, PointerResult};
use bigfile_storage::Oid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Pointer format version written by this crate
pub const POINTER_VERSION: &str = "https://git-lfs.github.com/spec/v1";

/// Pre-release version string still found in old histories
pub const LEGACY_POINTER_VERSION: &str = "https://hawser.github.com/spec/v1";

/// Largest input that can be a pointer
pub const MAX_POINTER_SIZE: usize = 1024;

/// Highest extension priority
pub const MAX_EXTENSION_PRIORITY: u8 = 9;

const OID_PREFIX: &str = "sha256:";
const OPTIONAL_KEY_PREFIX: &str = "x-";

/// One extension applied on clean
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerExtension {
    /// Extension name
    pub name: String,
    /// Position in the pipeline, 0..=9, unique per pointer
    pub priority: u8,
    /// Hash of the bytes this extension received
    pub oid: Oid,
}

impl PointerExtension {
    /// Create an extension record
    pub fn new<S: Into<String>>(name: S, priority: u8, oid: Oid) -> Self {
        Self {
            name: name.into(),
            priority,
            oid,
        }
    }

    fn key(&self) -> String {
        format!("ext-{}-{}", self.priority, self.name)
    }
}

/// Reference to content in the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    /// Format version
    pub version: String,
    /// Hash of the stored bytes
    pub oid: Oid,
    /// Size of the stored bytes
    pub size: u64,
    /// Extensions, ascending priority
    pub extensions: Vec<PointerExtension>,
    /// Optional `x-` fields in input order
    pub unknown: Vec<(String, String)>,
}

impl Pointer {
    /// Pointer to `size` bytes hashing to `oid`
    ///
    /// ```rust
    /// use bigfile_git::Pointer;
    /// use bigfile_storage::Oid;
    ///
    /// let pointer = Pointer::new(Oid::hash(b"0123456789"), 10);
    /// assert!(pointer.to_string().starts_with("version https://git-lfs.github.com/spec/v1\n"));
    /// ```
    pub fn new(oid: Oid, size: u64) -> Self {
        Self {
            version: POINTER_VERSION.to_string(),
            oid,
            size,
            extensions: Vec::new(),
            unknown: Vec::new(),
        }
    }

    /// Attach extension records, sorted by priority
    pub fn with_extensions(mut self, mut extensions: Vec<PointerExtension>) -> Self {
        extensions.sort_by_key(|e| e.priority);
        self.extensions = extensions;
        self
    }

    /// The pointer of the empty file
    pub fn empty() -> Self {
        Self::new(Oid::empty(), 0)
    }

    /// Whether this is the empty-file pointer, which encodes to zero bytes
    ///
    /// Only the current version qualifies. A legacy-version pointer to zero
    /// bytes keeps its text so it re-encodes to what was decoded.
    pub fn is_empty(&self) -> bool {
        self.version == POINTER_VERSION && self.is_empty_content()
    }

    /// Whether the pointer describes zero bytes, whatever its version
    pub fn is_empty_content(&self) -> bool {
        self.size == 0
            && self.oid == Oid::empty()
            && self.extensions.is_empty()
            && self.unknown.is_empty()
    }

    /// Encoded bytes (empty for the empty pointer)
    pub fn encode(&self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }
        self.to_string().into_bytes()
    }

    /// Decode pointer bytes
    ///
    /// # Errors
    ///
    /// [`PointerError::NotAPointer`] when the input is too large, not UTF-8
    /// or does not open with a known version line. [`PointerError::Malformed`]
    /// for any other format violation.
    ///
    /// ```rust
    /// use bigfile_git::Pointer;
    ///
    /// let err = Pointer::decode(b"just some file content").unwrap_err();
    /// assert!(err.is_not_a_pointer());
    /// assert!(Pointer::decode(b"").unwrap().is_empty());
    /// ```
    pub fn decode(data: &[u8]) -> PointerResult<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }
        if data.len() > MAX_POINTER_SIZE {
            return Err(PointerError::NotAPointer(format!(
                "{} bytes exceeds pointer limit of {}",
                data.len(),
                MAX_POINTER_SIZE
            )));
        }
        let text = std::str::from_utf8(data)
            .map_err(|_| PointerError::NotAPointer("not valid UTF-8".to_string()))?;

        let body = text.strip_suffix('\n').unwrap_or(text);
        let mut lines = body.split('\n');

        let version = match lines.next().and_then(|line| line.strip_prefix("version ")) {
            Some(v) if v == POINTER_VERSION || v == LEGACY_POINTER_VERSION => v.to_string(),
            _ => {
                return Err(PointerError::NotAPointer(
                    "missing version line".to_string(),
                ))
            }
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut priorities: HashSet<u8> = HashSet::new();
        let mut oid = None;
        let mut size = None;
        let mut extensions = Vec::new();
        let mut unknown = Vec::new();

        for line in lines {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| PointerError::Malformed(format!("invalid line: {:?}", line)))?;
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(PointerError::Malformed(format!("invalid key: {:?}", key)));
            }
            if !seen.insert(key) {
                return Err(PointerError::Malformed(format!("duplicate key: {}", key)));
            }

            match key {
                "version" => {
                    return Err(PointerError::Malformed("duplicate key: version".to_string()))
                }
                "oid" => oid = Some(parse_oid(value)?),
                "size" => size = Some(parse_size(value)?),
                _ if key.starts_with("ext-") => {
                    let extension = parse_extension(key, value)?;
                    if !priorities.insert(extension.priority) {
                        return Err(PointerError::Malformed(format!(
                            "duplicate extension priority: {}",
                            extension.priority
                        )));
                    }
                    extensions.push(extension);
                }
                _ if key.starts_with(OPTIONAL_KEY_PREFIX) => {
                    unknown.push((key.to_string(), value.to_string()));
                }
                _ => {
                    return Err(PointerError::Malformed(format!(
                        "unknown required field: {}",
                        key
                    )))
                }
            }
        }

        let oid = oid.ok_or_else(|| PointerError::Malformed("missing oid".to_string()))?;
        let size = size.ok_or_else(|| PointerError::Malformed("missing size".to_string()))?;
        extensions.sort_by_key(|e| e.priority);

        Ok(Self {
            version,
            oid,
            size,
            extensions,
            unknown,
        })
    }
}

/// Whether `name` can appear in an `ext-<priority>-<name>` key
///
/// ```rust
/// use bigfile_git::pointer::is_valid_extension_name;
///
/// assert!(is_valid_extension_name("zstd"));
/// assert!(!is_valid_extension_name("my-ext"));
/// ```
pub fn is_valid_extension_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn parse_oid(value: &str) -> PointerResult<Oid> {
    let hex = value
        .strip_prefix(OID_PREFIX)
        .ok_or_else(|| PointerError::Malformed(format!("unsupported oid: {}", value)))?;
    Oid::from_hex(hex).map_err(|e| PointerError::Malformed(e.to_string()))
}

fn parse_size(value: &str) -> PointerResult<u64> {
    let canonical = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && (value == "0" || !value.starts_with('0'));
    if !canonical {
        return Err(PointerError::Malformed(format!("invalid size: {:?}", value)));
    }
    value
        .parse::<u64>()
        .map_err(|e| PointerError::Malformed(format!("invalid size {:?}: {}", value, e)))
}

fn parse_extension(key: &str, value: &str) -> PointerResult<PointerExtension> {
    let malformed = || PointerError::Malformed(format!("invalid extension key: {}", key));

    let rest = key.strip_prefix("ext-").ok_or_else(malformed)?;
    let (priority, name) = rest.split_once('-').ok_or_else(malformed)?;
    if priority.len() != 1 {
        return Err(malformed());
    }
    let priority = priority.parse::<u8>().map_err(|_| malformed())?;
    if !is_valid_extension_name(name) {
        return Err(malformed());
    }

    Ok(PointerExtension::new(name, priority, parse_oid(value)?))
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version {}", self.version)?;
        writeln!(f, "oid {}{}", OID_PREFIX, self.oid)?;
        writeln!(f, "size {}", self.size)?;

        let mut extensions: Vec<&PointerExtension> = self.extensions.iter().collect();
        extensions.sort_by_key(|e| e.priority);
        for extension in extensions {
            writeln!(f, "{} {}{}", extension.key(), OID_PREFIX, extension.oid)?;
        }
        for (key, value) in &self.unknown {
            writeln!(f, "{} {}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_OID: &str = "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393";

    fn oid() -> Oid {
        Oid::from_hex(VALID_OID).unwrap()
    }

    fn text(body: &str) -> String {
        format!("version {}\n{}", POINTER_VERSION, body)
    }

    #[test]
    fn test_encode_layout() {
        let pointer = Pointer::new(oid(), 12345).with_extensions(vec![
            PointerExtension::new("bar", 1, Oid::hash(b"b")),
            PointerExtension::new("foo", 0, Oid::hash(b"a")),
        ]);
        let encoded = pointer.to_string();
        let lines: Vec<&str> = encoded.lines().collect();

        assert_eq!(lines[0], format!("version {}", POINTER_VERSION));
        assert_eq!(lines[1], format!("oid sha256:{}", VALID_OID));
        assert_eq!(lines[2], "size 12345");
        assert!(lines[3].starts_with("ext-0-foo sha256:"));
        assert!(lines[4].starts_with("ext-1-bar sha256:"));
        assert!(encoded.ends_with('\n'));
    }

    #[test]
    fn test_decode_valid() {
        let pointer = Pointer::decode(text(&format!("oid sha256:{}\nsize 12345\n", VALID_OID)).as_bytes()).unwrap();
        assert_eq!(pointer, Pointer::new(oid(), 12345));
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        let pointer = Pointer::decode(text(&format!("oid sha256:{}\nsize 7", VALID_OID)).as_bytes()).unwrap();
        assert_eq!(pointer.size, 7);
    }

    #[test]
    fn test_optional_fields_preserved_in_order() {
        let input = text(&format!(
            "oid sha256:{}\nsize 1\nx-zeta last\nx-alpha first value\n",
            VALID_OID
        ));
        let pointer = Pointer::decode(input.as_bytes()).unwrap();
        assert_eq!(
            pointer.unknown,
            vec![
                ("x-zeta".to_string(), "last".to_string()),
                ("x-alpha".to_string(), "first value".to_string()),
            ]
        );
        assert_eq!(pointer.to_string(), input);
    }

    #[test]
    fn test_unknown_required_field_is_malformed() {
        let input = text(&format!("oid sha256:{}\nsize 1\ncolor blue\n", VALID_OID));
        assert!(matches!(
            Pointer::decode(input.as_bytes()),
            Err(PointerError::Malformed(_))
        ));
    }

    #[test]
    fn test_not_a_pointer() {
        for input in [
            &b"plain text content"[..],
            &b"version https://example.com/spec/v9\nsize 1\n"[..],
            &[0xff, 0xfe, 0x00][..],
        ] {
            assert!(Pointer::decode(input).unwrap_err().is_not_a_pointer());
        }

        let large = text(&"x".repeat(MAX_POINTER_SIZE));
        assert!(Pointer::decode(large.as_bytes()).unwrap_err().is_not_a_pointer());
    }

    #[test]
    fn test_malformed_fields() {
        let cases = [
            format!("oid sha256:{}\n", VALID_OID),
            "size 10\n".to_string(),
            "oid sha256:notahash\nsize 10\n".to_string(),
            format!("oid md5:{}\nsize 10\n", VALID_OID),
            format!("oid sha256:{}\nsize 10\n", VALID_OID.to_uppercase()),
            format!("oid sha256:{}\nsize -1\n", VALID_OID),
            format!("oid sha256:{}\nsize +1\n", VALID_OID),
            format!("oid sha256:{}\nsize 010\n", VALID_OID),
            format!("oid sha256:{}\nsize 99999999999999999999\n", VALID_OID),
            format!("oid sha256:{}\n\nsize 10\n", VALID_OID),
            format!("oid sha256:{}\nsize 10\nsize 10\n", VALID_OID),
            format!("oid sha256:{}\nsize 10\nversion {}\n", VALID_OID, POINTER_VERSION),
            format!("oid sha256:{0}\nsize 10\next-10-foo sha256:{0}\n", VALID_OID),
            format!("oid sha256:{0}\nsize 10\next-1-foo sha256:{0}\next-1-bar sha256:{0}\n", VALID_OID),
        ];
        for body in cases {
            let result = Pointer::decode(text(&body).as_bytes());
            assert!(
                matches!(result, Err(PointerError::Malformed(_))),
                "expected malformed for {:?}, got {:?}",
                body,
                result
            );
        }
    }

    #[test]
    fn test_extensions_sorted_on_decode() {
        let input = text(&format!(
            "oid sha256:{0}\nsize 3\next-2-baz sha256:{0}\next-0-foo sha256:{0}\n",
            VALID_OID
        ));
        let pointer = Pointer::decode(input.as_bytes()).unwrap();
        let priorities: Vec<u8> = pointer.extensions.iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![0, 2]);
    }

    #[test]
    fn test_legacy_version_preserved() {
        let input = format!(
            "version {}\noid sha256:{}\nsize 5\n",
            LEGACY_POINTER_VERSION, VALID_OID
        );
        let pointer = Pointer::decode(input.as_bytes()).unwrap();
        assert_eq!(pointer.version, LEGACY_POINTER_VERSION);
        assert_eq!(pointer.to_string(), input);
    }

    #[test]
    fn test_empty_pointer() {
        let empty = Pointer::decode(b"").unwrap();
        assert!(empty.is_empty());
        assert!(empty.encode().is_empty());

        let explicit = text(&format!("oid sha256:{}\nsize 0\n", Oid::empty()));
        assert_eq!(Pointer::decode(explicit.as_bytes()).unwrap(), Pointer::empty());
    }

    #[test]
    fn test_legacy_empty_pointer_keeps_text() {
        let input = format!(
            "version {}\noid sha256:{}\nsize 0\n",
            LEGACY_POINTER_VERSION,
            Oid::empty()
        );
        let pointer = Pointer::decode(input.as_bytes()).unwrap();
        assert_eq!(pointer.version, LEGACY_POINTER_VERSION);
        assert!(!pointer.is_empty());
        assert!(pointer.is_empty_content());
        assert_eq!(pointer.encode(), input.as_bytes());
        assert_eq!(Pointer::decode(&pointer.encode()).unwrap(), pointer);
    }

    #[test]
    fn test_extension_names() {
        assert!(is_valid_extension_name("zstd"));
        assert!(is_valid_extension_name("Crypt_2"));
        for bad in ["", "my-ext", "a b", "ext.v2", "naïve"] {
            assert!(!is_valid_extension_name(bad), "{:?}", bad);
        }
        let key = text(&format!("oid sha256:{}\nsize 1\next-0-my-ext sha256:{}\n", VALID_OID, VALID_OID));
        assert!(matches!(Pointer::decode(key.as_bytes()), Err(PointerError::Malformed(_))));
    }

    #[test]
    fn test_roundtrip() {
        let original = Pointer::new(oid(), 12345)
            .with_extensions(vec![PointerExtension::new("zstd", 0, Oid::hash(b"raw"))]);
        assert_eq!(Pointer::decode(&original.encode()).unwrap(), original);
    }
}
