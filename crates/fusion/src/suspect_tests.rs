// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mark_and_clear() {
    let mut set = SuspectSet::new();
    set.mark("/x", 100.0, 100.0, 30.0);
    assert_eq!(set.len(), 1);
    assert!(set.clear("/x"));
    assert!(!set.clear("/x"));
}

#[test]
fn remark_keeps_first_seen_and_refreshes_expiry() {
    let mut set = SuspectSet::new();
    set.mark("/x", 100.0, 100.0, 30.0);
    set.mark("/x", 105.0, 110.0, 30.0);
    let entry = set.get("/x").expect("entry");
    assert_eq!(entry.first_seen, 100.0);
    assert_eq!(entry.mtime_at_mark, 105.0);
    assert_eq!(entry.expires_at, 140.0);
}

#[test]
fn confirm_stable_clears() {
    let mut set = SuspectSet::new();
    set.mark("/x", 100.0, 100.0, 30.0);
    assert_eq!(set.confirm("/x", 100.0005, 0.001, 110.0, 30.0), Verdict::Stable);
    assert!(set.is_empty());
}

#[test]
fn confirm_moved_refreshes_and_keeps() {
    let mut set = SuspectSet::new();
    set.mark("/x", 100.0, 100.0, 30.0);
    assert_eq!(set.confirm("/x", 103.0, 0.001, 110.0, 30.0), Verdict::StillHot);
    let entry = set.get("/x").expect("entry");
    assert_eq!(entry.mtime_at_mark, 103.0);
    assert_eq!(entry.expires_at, 140.0);
}

#[test]
fn confirm_unknown_path() {
    let mut set = SuspectSet::new();
    assert_eq!(set.confirm("/x", 1.0, 0.001, 2.0, 30.0), Verdict::Unknown);
}

#[test]
fn purge_returns_expired_paths() {
    let mut set = SuspectSet::new();
    set.mark("/old", 1.0, 0.0, 30.0);
    set.mark("/new", 1.0, 20.0, 30.0);
    let expired = set.purge_expired(40.0);
    assert_eq!(expired, vec!["/old".to_string()]);
    assert!(set.get("/new").is_some());
}
