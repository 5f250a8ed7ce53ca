// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn noop_watcher() -> RecommendedWatcher {
    notify::recommended_watcher(|_res: Result<notify::Event, notify::Error>| {})
        .expect("watcher init")
}

fn dirs(base: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|n| {
            let p = base.join(n);
            std::fs::create_dir_all(&p).expect("mkdir");
            p
        })
        .collect()
}

#[test]
fn register_within_budget_keeps_all() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = WatchRegistry::new(noop_watcher(), 8);
    let paths = dirs(tmp.path(), &["a", "b", "c"]);
    for p in &paths {
        registry.register(p);
    }
    assert_eq!(registry.len(), 3);
}

#[test]
fn register_over_budget_evicts_oldest() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = WatchRegistry::new(noop_watcher(), 2);
    let paths = dirs(tmp.path(), &["a", "b", "c"]);
    for p in &paths {
        registry.register(p);
    }
    assert_eq!(registry.len(), 2, "budget enforced");
}

#[test]
fn touch_refreshes_recency() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = WatchRegistry::new(noop_watcher(), 2);
    let paths = dirs(tmp.path(), &["a", "b", "c"]);
    registry.register(&paths[0]);
    registry.register(&paths[1]);
    // Touch "a" so "b" becomes the eviction candidate.
    registry.touch(&paths[0]);
    registry.register(&paths[2]);
    assert_eq!(registry.len(), 2);
    // Re-registering "a" refreshes rather than evicting.
    registry.register(&paths[0]);
    assert_eq!(registry.len(), 2);
}

#[test]
fn unregister_is_idempotent() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = WatchRegistry::new(noop_watcher(), 4);
    let paths = dirs(tmp.path(), &["a"]);
    registry.register(&paths[0]);
    registry.unregister(&paths[0]);
    registry.unregister(&paths[0]);
    assert!(registry.is_empty());
}
