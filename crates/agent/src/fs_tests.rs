// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn fixture() -> (tempfile::TempDir, FsSource) {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(tmp.path().join("a/b")).expect("mkdir");
    std::fs::write(tmp.path().join("a/one.txt"), b"one").expect("write");
    std::fs::write(tmp.path().join("a/b/two.txt"), b"two!").expect("write");
    let source = FsSource::new(tmp.path(), 1024);
    (tmp, source)
}

fn collect(stream: RowStream) -> Vec<FsRow> {
    let mut rows: Vec<FsRow> = stream.collect();
    rows.sort_by(|x, y| x.path.cmp(&y.path));
    rows
}

#[test]
fn snapshot_scan_emits_tree_paths() {
    let (_tmp, source) = fixture();
    let rows = collect(source.snapshot_scan().expect("scan"));
    let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/a/b", "/a/b/two.txt", "/a/one.txt"]);

    let file = rows.iter().find(|r| r.path == "/a/one.txt").expect("row");
    assert!(!file.is_directory);
    assert_eq!(file.size, 3);
    assert!(file.modified_time > 0.0);
    assert_eq!(file.file_name, "one.txt");
}

#[test]
fn snapshot_scan_missing_root_errors() {
    let source = FsSource::new("/definitely/not/here", 16);
    assert!(source.snapshot_scan().is_err());
}

#[test]
fn audit_scan_carries_parent_mtime() {
    let (tmp, source) = fixture();
    let rows = collect(source.audit_scan().expect("scan"));
    let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/a/b", "/a/b/two.txt", "/a/one.txt"]);

    let dir_meta = std::fs::metadata(tmp.path().join("a")).expect("stat");
    let dir_mtime = dir_meta
        .modified()
        .expect("mtime")
        .duration_since(std::time::UNIX_EPOCH)
        .expect("epoch")
        .as_secs_f64();
    let file = rows.iter().find(|r| r.path == "/a/one.txt").expect("row");
    assert_eq!(file.parent_mtime, Some(dir_mtime));
}

#[test]
fn audit_scan_reuses_cache_for_unchanged_dirs() {
    let (_tmp, source) = fixture();
    let first = collect(source.audit_scan().expect("scan"));
    let second = collect(source.audit_scan().expect("scan"));
    assert_eq!(first, second, "unchanged tree scans identically from cache");
}

#[test]
fn audit_scan_sees_new_files_after_dir_change() {
    let (tmp, source) = fixture();
    let _ = source.audit_scan().expect("scan");
    std::fs::write(tmp.path().join("a/three.txt"), b"3").expect("write");
    let rows = collect(source.audit_scan().expect("scan"));
    assert!(rows.iter().any(|r| r.path == "/a/three.txt"));
}

#[test]
fn stat_reports_presence_and_absence() {
    let (_tmp, source) = fixture();
    let hit = source.stat("/a/one.txt");
    assert!(hit.exists);
    assert_eq!(hit.size, Some(3));
    assert!(hit.mtime.is_some());

    let miss = source.stat("/a/ghost.txt");
    assert!(!miss.exists);
    assert_eq!(miss.mtime, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_emits_rows_for_mutations() {
    let (tmp, source) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let _handle = source.watch(tx).expect("watch");

    // Give the watcher a beat to arm before mutating.
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(tmp.path().join("a/new.txt"), b"n").expect("write");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, rx.recv())
            .await
            .expect("watch event before timeout")
            .expect("stream open");
        if event.row.path == "/a/new.txt" {
            assert!(matches!(event.kind, EventKind::Insert | EventKind::Update));
            break;
        }
    }
}
