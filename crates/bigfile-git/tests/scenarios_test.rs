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
#![allow(clippy::unwrap_used)]
//! End-to-end behaviour of the clean/smudge engine, the filter session and
//! the integrity checker

use bigfile_git::fsck::{FsckChecker, FsckOptions, IssueCategory};
use bigfile_git::scanner::PointerScanner;
use bigfile_git::{
    BackendTransfer, FilterConfig, FilterDriver, FilterSession, FrameCodec, Framing, Operation, PathFilter, Pointer,
    ProtocolFault, SessionConfig, SessionError, SessionOutcome, SmudgeOutput,
};
use bigfile_storage::mock::MockBackend;
use bigfile_storage::{LocalBackend, ObjectStore, Oid, StorageBackend};
use git2::{Repository, Signature};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    remote: MockBackend,
    driver: FilterDriver,
}

async fn fixture(config: FilterConfig) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = ObjectStore::open(dir.path().join("store")).await.unwrap();
    let remote = MockBackend::new();
    let driver = FilterDriver::new(config, store, Arc::new(BackendTransfer::new(Arc::new(remote.clone()))));
    Fixture {
        _dir: dir,
        remote,
        driver,
    }
}

async fn render(output: &SmudgeOutput) -> Vec<u8> {
    let mut out = Vec::new();
    output.write_to(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn scenario_a_clean_is_content_addressed() {
    let fx = fixture(FilterConfig::default()).await;

    let first = fx.driver.clean(&b"0123456789"[..], "one.bin", Some(10)).await.unwrap();
    assert_eq!(first.size, 10);
    assert_eq!(first.oid, Oid::hash(b"0123456789"));
    assert_eq!(
        first.oid.to_hex(),
        "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882"
    );

    let second = fx.driver.clean(&b"0123456789"[..], "elsewhere/two.bin", None).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.encode(), second.encode());
    assert_eq!(fx.driver.store().list().await.unwrap(), vec![first.oid]);
}

#[tokio::test]
async fn scenario_b_download_then_local() {
    let fx = fixture(FilterConfig::default()).await;
    let oid = Oid::hash(b"0123456789");
    fx.remote.put(&oid.to_hex(), b"0123456789").await.unwrap();
    let pointer = Pointer::new(oid, 10).encode();

    let first = fx.driver.smudge(&pointer[..], "a.bin", true).await.unwrap();
    assert_eq!(render(&first).await, b"0123456789");
    assert!(fx.driver.store().contains(&oid).await.unwrap());
    assert_eq!(fx.remote.read_count(), 1);

    let second = fx.driver.smudge(&pointer[..], "a.bin", true).await.unwrap();
    assert_eq!(render(&second).await, b"0123456789");
    assert_eq!(fx.remote.read_count(), 1);
}

#[tokio::test]
async fn scenario_c_excluded_path_keeps_pointer() {
    let config = FilterConfig {
        fetch_filter: PathFilter::new(&["*"], &["excluded"]).unwrap(),
        ..FilterConfig::default()
    };
    let fx = fixture(config).await;
    let oid = Oid::hash(b"0123456789");
    fx.remote.put(&oid.to_hex(), b"0123456789").await.unwrap();
    let pointer = Pointer::new(oid, 10).encode();

    let allowed = fx.driver.download_allowed("excluded/a.bin");
    assert!(!allowed);
    let output = fx.driver.smudge(&pointer[..], "excluded/a.bin", allowed).await.unwrap();
    assert_eq!(render(&output).await, pointer);
    assert_eq!(fx.remote.read_count(), 0);
}

#[tokio::test]
async fn scenario_d_truncated_payload_is_a_fault() {
    let fx = fixture(FilterConfig::default()).await;
    let mut input = b"bigfile-host/1 framing=binary\n".to_vec();
    input.extend_from_slice(&1u32.to_le_bytes());
    input.extend_from_slice(&5u32.to_le_bytes());
    input.extend_from_slice(b"a.bin");
    input.extend_from_slice(&64u32.to_le_bytes());
    input.extend_from_slice(b"short");

    let mut output = Vec::new();
    let mut session = FilterSession::new(fx.driver, SessionConfig::default(), &input[..], &mut output);
    let err = session.run().await.unwrap_err();
    drop(session);

    assert!(matches!(
        err,
        SessionError::Protocol(ProtocolFault::Truncated { declared: 64, received: 5 })
    ));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(output, b"bigfile-filter/1 framing=binary,text\n");
}

fn commit_pointer(repo: &Repository, name: &str, pointer: &Pointer) {
    let workdir = repo.workdir().unwrap().to_path_buf();
    fs::write(workdir.join(name), pointer.encode()).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "add pointer", &tree, &[])
        .unwrap();
}

#[tokio::test]
async fn scenario_e_corrupt_object_quarantined() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let store = ObjectStore::open(dir.path().join(".git/bigfile")).await.unwrap();

    let driver = FilterDriver::new(FilterConfig::default(), store.clone(), Arc::new(bigfile_git::NoTransfer));
    let pointer = driver.clean(&b"precious bytes"[..], "asset.bin", None).await.unwrap();
    commit_pointer(&repo, "asset.bin", &pointer);
    fs::write(store.object_path(&pointer.oid), b"bit rot").unwrap();

    let pointers = PointerScanner::from_repository(repo).scan(&[]).unwrap();
    assert_eq!(pointers.len(), 1);
    let checker = FsckChecker::new(store.clone());

    let report = checker.check(&pointers, &FsckOptions::default()).await.unwrap();
    let corrupt = report.issues_by_category(IssueCategory::ChecksumMismatch);
    assert_eq!(corrupt.len(), 1);
    assert_eq!(corrupt[0].oid, pointer.oid);
    assert_eq!(corrupt[0].name.as_deref(), Some("asset.bin"));
    assert!(!store.contains(&pointer.oid).await.unwrap());

    let rerun = checker.check(&pointers, &FsckOptions::default()).await.unwrap();
    assert_eq!(rerun.missing_objects, 1);
    assert_eq!(rerun.corrupted_objects, 0);

    let json = serde_json::to_value(&rerun).unwrap();
    assert_eq!(json["missing_objects"], 1);
}

#[tokio::test]
async fn responses_follow_request_order() {
    let fx = fixture(FilterConfig::default()).await;
    let codec = FrameCodec::new(Framing::Text, u64::MAX);
    let files: Vec<Vec<u8>> = (0..20).map(|i| format!("file number {}", i).repeat(i + 1).into_bytes()).collect();

    let mut input = b"bigfile-host/1 framing=text\n".to_vec();
    for (i, content) in files.iter().enumerate() {
        input.extend(codec.encode_request(Operation::Clean, &format!("f{}.bin", i), content));
    }
    for (i, content) in files.iter().enumerate().rev() {
        let pointer = Pointer::new(Oid::hash(content), content.len() as u64).encode();
        input.extend(codec.encode_request(Operation::Smudge, &format!("f{}.bin", i), &pointer));
    }

    let mut output = Vec::new();
    let mut session = FilterSession::new(fx.driver, SessionConfig::default(), &input[..], &mut output);
    let summary = session.run().await.unwrap();
    drop(session);
    assert_eq!(summary.outcome, SessionOutcome::EndOfStream);

    let offer_len = "bigfile-filter/1 framing=binary,text\n".len();
    let replies = codec.decode_responses(&output[offer_len..]).unwrap();
    assert_eq!(replies.len(), 40);
    for (i, content) in files.iter().enumerate() {
        let pointer = Pointer::decode(&replies[i]).unwrap();
        assert_eq!(pointer.oid, Oid::hash(content));
        assert_eq!(&replies[39 - i], content);
    }
}

#[tokio::test]
async fn shared_directory_remote_round_trip() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(LocalBackend::new(dir.path().join("remote")).await.unwrap());
    let transfer = Arc::new(BackendTransfer::new(remote));

    let upstream = ObjectStore::open(dir.path().join("upstream")).await.unwrap();
    let producer = FilterDriver::new(FilterConfig::default(), upstream.clone(), transfer.clone());
    let pointer = producer.clean(&b"shared content"[..], "s.bin", None).await.unwrap();
    let path = upstream.get(&pointer.oid).await.unwrap();
    bigfile_git::Transfer::upload(transfer.as_ref(), &pointer.oid, pointer.size, &path, None)
        .await
        .unwrap();

    let downstream = ObjectStore::open(dir.path().join("downstream")).await.unwrap();
    let consumer = FilterDriver::new(FilterConfig::default(), downstream, transfer);
    let output = consumer.smudge(&pointer.encode()[..], "s.bin", true).await.unwrap();
    assert_eq!(render(&output).await, b"shared content");
}
