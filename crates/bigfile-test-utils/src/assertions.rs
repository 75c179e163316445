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

//! Assertions over pointers and the object store.

use bigfile_git::Pointer;
use bigfile_storage::Oid;
use std::path::Path;

/// Assert that `bytes` is a canonical pointer for `content` and return it.
pub fn assert_pointer_for(bytes: &[u8], content: &[u8]) -> Pointer {
    let pointer = Pointer::decode(bytes).unwrap_or_else(|e| {
        panic!(
            "expected a pointer, got {:?}: {}",
            String::from_utf8_lossy(bytes),
            e
        )
    });
    assert_eq!(pointer.oid, Oid::hash(content), "pointer oid");
    assert_eq!(pointer.size, content.len() as u64, "pointer size");
    assert_eq!(pointer.encode(), bytes, "pointer is not canonical");
    pointer
}

/// Assert that the store rooted at `store_dir` holds `content`.
pub fn assert_object_stored(store_dir: &Path, content: &[u8]) {
    let oid = Oid::hash(content);
    let (first, second) = oid.shards();
    let path = store_dir
        .join("objects")
        .join(first)
        .join(second)
        .join(oid.to_hex());
    let stored = std::fs::read(&path).unwrap_or_else(|e| panic!("object {} missing at {:?}: {}", oid, path, e));
    assert_eq!(stored, content, "object {} content", oid);
}

/// Assert that the store rooted at `store_dir` does not hold `content`.
pub fn assert_object_absent(store_dir: &Path, content: &[u8]) {
    let oid = Oid::hash(content);
    let (first, second) = oid.shards();
    let path = store_dir.join("objects").join(first).join(second).join(oid.to_hex());
    assert!(!path.exists(), "object {} should not be stored", oid);
}
