// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watched-directory registry with a budget.
//!
//! inotify watches are a finite kernel resource. Every watched directory is
//! tracked in LRU order; when the OS reports watch exhaustion the budget is
//! tuned down to the currently-successful count and the least-recently
//! active directories are evicted. The registry lock is reentrant because
//! watcher callbacks can fire on the thread that is mutating the registry;
//! unwatching goes through the owning thread rather than watcher callbacks
//! because the watcher library holds internal locks.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};

struct Registry {
    /// Insertion order doubles as recency order: oldest first.
    dirs: IndexMap<PathBuf, ()>,
}

/// Budgeted registry of per-directory watches.
pub struct WatchRegistry {
    watcher: Mutex<RecommendedWatcher>,
    inner: ReentrantMutex<RefCell<Registry>>,
    limit: AtomicUsize,
}

impl WatchRegistry {
    pub fn new(watcher: RecommendedWatcher, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            watcher: Mutex::new(watcher),
            inner: ReentrantMutex::new(RefCell::new(Registry { dirs: IndexMap::new() })),
            limit: AtomicUsize::new(limit.max(1)),
        })
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let len = guard.borrow().dirs.len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Watch a directory, evicting least-recently-active entries when the
    /// budget is reached. Re-registering an already-watched directory just
    /// refreshes its recency.
    pub fn register(&self, dir: &Path) {
        let guard = self.inner.lock();
        {
            let mut registry = guard.borrow_mut();
            if registry.dirs.shift_remove(dir).is_some() {
                registry.dirs.insert(dir.to_path_buf(), ());
                return;
            }
            while registry.dirs.len() >= self.limit.load(Ordering::Relaxed) {
                if !self.evict_oldest(&mut registry) {
                    break;
                }
            }
        }

        match self.watcher.lock().watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                guard.borrow_mut().dirs.insert(dir.to_path_buf(), ());
            }
            Err(e) if is_watch_exhaustion(&e) => {
                // Tune the budget down to what the kernel actually granted
                // and make room for the newcomer.
                let mut registry = guard.borrow_mut();
                let granted = registry.dirs.len();
                self.limit.store(granted.max(1), Ordering::Relaxed);
                warn!(limit = granted, "watch budget exhausted, auto-tuning down");
                if self.evict_oldest(&mut registry) {
                    drop(registry);
                    if self.watcher.lock().watch(dir, RecursiveMode::NonRecursive).is_ok() {
                        guard.borrow_mut().dirs.insert(dir.to_path_buf(), ());
                    }
                }
            }
            Err(e) => warn!(dir = %dir.display(), "cannot watch directory: {e}"),
        }
    }

    /// Record activity under a directory.
    pub fn touch(&self, dir: &Path) {
        let guard = self.inner.lock();
        let mut registry = guard.borrow_mut();
        if registry.dirs.shift_remove(dir).is_some() {
            registry.dirs.insert(dir.to_path_buf(), ());
        }
    }

    /// Drop the watch for a removed directory.
    pub fn unregister(&self, dir: &Path) {
        let guard = self.inner.lock();
        let removed = guard.borrow_mut().dirs.shift_remove(dir).is_some();
        if removed {
            if let Err(e) = self.watcher.lock().unwatch(dir) {
                debug!(dir = %dir.display(), "unwatch failed (already gone?): {e}");
            }
        }
    }

    fn evict_oldest(&self, registry: &mut Registry) -> bool {
        let Some((oldest, _)) = registry.dirs.shift_remove_index(0) else {
            return false;
        };
        debug!(dir = %oldest.display(), "evicting least-recently-active watch");
        if let Err(e) = self.watcher.lock().unwatch(&oldest) {
            debug!(dir = %oldest.display(), "unwatch failed during eviction: {e}");
        }
        true
    }
}

fn is_watch_exhaustion(e: &notify::Error) -> bool {
    matches!(e.kind, notify::ErrorKind::MaxFilesWatch)
        || matches!(
            &e.kind,
            notify::ErrorKind::Io(io) if io.raw_os_error() == Some(libc_enospc())
        )
}

/// inotify reports watch exhaustion as ENOSPC.
fn libc_enospc() -> i32 {
    28
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
