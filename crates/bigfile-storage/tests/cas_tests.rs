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

//! Object store behaviour across handles and tasks

use bigfile_storage::{CommitOutcome, ObjectStore, Oid, StorageBackend, LocalBackend};
use tempfile::TempDir;

/// Two independent handles on one root (two processes) converge on one object
#[tokio::test]
async fn test_concurrent_writers_converge() {
    let temp_dir = TempDir::new().unwrap();
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let root = temp_dir.path().to_path_buf();
        let data = data.clone();
        handles.push(tokio::spawn(async move {
            let store = ObjectStore::open(root).await.unwrap();
            let temp = store.put(&data[..], Some(data.len() as u64)).await.unwrap();
            store.commit(temp, false).await.unwrap()
        }));
    }

    let mut stored = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), CommitOutcome::Stored(_)) {
            stored += 1;
        }
    }
    assert!(stored >= 1);

    let store = ObjectStore::open(temp_dir.path()).await.unwrap();
    let oid = Oid::hash(&data);
    assert_eq!(store.list().await.unwrap(), vec![oid]);
    assert!(store.verify(&oid).await.unwrap());
    assert_eq!(std::fs::read_dir(store.tmp_dir()).unwrap().count(), 0);
}

/// Storing the same bytes twice is a no-op the second time
#[tokio::test]
async fn test_put_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let store = ObjectStore::open(temp_dir.path()).await.unwrap();

    let first = store.put(&b"deterministic"[..], None).await.unwrap();
    let oid = *first.oid();
    let path = store.commit(first, false).await.unwrap().path().to_path_buf();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

    let second = store.put(&b"deterministic"[..], None).await.unwrap();
    assert_eq!(*second.oid(), oid);
    let outcome = store.commit(second, false).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Existing(path.clone()));
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

/// A store root doubles as a shared-directory remote
#[tokio::test]
async fn test_store_root_serves_as_remote() {
    let temp_dir = TempDir::new().unwrap();
    let store = ObjectStore::open(temp_dir.path()).await.unwrap();
    let temp = store.put(&b"published"[..], None).await.unwrap();
    let oid = *temp.oid();
    store.commit(temp, false).await.unwrap();

    let remote = LocalBackend::new(temp_dir.path()).await.unwrap();
    assert!(remote.exists(&oid.to_hex()).await.unwrap());
    assert_eq!(remote.get(&oid.to_hex()).await.unwrap(), b"published");
}
