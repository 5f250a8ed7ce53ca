// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem source driver.
//!
//! Paths cross the wire in tree form: `/`-separated and relative to the
//! watched root, so the view's tree root is the share root. Scans go
//! through `walkdir`; the realtime stream is a `notify` watcher feeding a
//! bounded channel (full channel blocks the dispatcher, which is the
//! backpressure the pipe relies on). Stat failures skip the path with a
//! warning; a scan never kills the pipe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fustor_core::{path as tree_path, EventKind, FsRow};
use fustor_wire::SentinelResult;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::source::{RowStream, Source, SourceError, WatchEvent, WatchHandle};
use crate::watch::WatchRegistry;

/// Cached contents of one directory from the previous audit cycle.
#[derive(Debug, Clone)]
struct DirCacheEntry {
    mtime: f64,
    files: Vec<FsRow>,
    subdirs: Vec<PathBuf>,
}

/// Source driver for a local (typically NFS-mounted) directory tree.
pub struct FsSource {
    root: PathBuf,
    watch_limit: usize,
    /// Per-directory audit cache: directories whose mtime is unchanged
    /// reuse their cached child rows instead of re-statting every entry.
    audit_cache: Mutex<HashMap<PathBuf, DirCacheEntry>>,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>, watch_limit: usize) -> Self {
        Self { root: root.into(), watch_limit, audit_cache: Mutex::new(HashMap::new()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an absolute path to tree form. `None` for paths outside the root.
    fn tree_path(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let rel = rel.to_string_lossy();
        Some(tree_path::normalize(&rel.replace(std::path::MAIN_SEPARATOR, "/")))
    }

    /// Map a tree path back to an absolute path under the root.
    fn abs_path(&self, tree: &str) -> PathBuf {
        self.root.join(tree.trim_start_matches('/'))
    }

    fn row(&self, abs: &Path) -> Option<FsRow> {
        let meta = match std::fs::symlink_metadata(abs) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %abs.display(), "stat failed, skipping: {e}");
                return None;
            }
        };
        let path = self.tree_path(abs)?;
        let mut row = FsRow::new(path, meta.len(), epoch_secs(meta.modified().ok()), meta.is_dir());
        row.created_time = meta.created().ok().map(|t| epoch_secs(Some(t)));
        Some(row)
    }
}

fn epoch_secs(time: Option<SystemTime>) -> f64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Source for FsSource {
    fn snapshot_scan(&self) -> Result<RowStream, SourceError> {
        if !self.root.exists() {
            return Err(SourceError::Io {
                path: self.root.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "root does not exist"),
            });
        }
        let root = self.root.clone();
        let iter = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(root = %root.display(), "walk error, skipping entry: {e}");
                    None
                }
            })
            .filter_map({
                let source_root = self.root.clone();
                move |entry| row_from_entry(&source_root, &entry)
            });
        Ok(Box::new(iter))
    }

    fn audit_scan(&self) -> Result<RowStream, SourceError> {
        let mut rows = Vec::new();
        let mut fresh_cache: HashMap<PathBuf, DirCacheEntry> = HashMap::new();
        let mut stack: Vec<(PathBuf, Option<f64>)> = vec![(self.root.clone(), None)];
        let cache = self.audit_cache.lock();

        while let Some((dir, parent_mtime)) = stack.pop() {
            let dir_mtime = match std::fs::symlink_metadata(&dir) {
                Ok(meta) => epoch_secs(meta.modified().ok()),
                Err(e) => {
                    warn!(dir = %dir.display(), "stat failed, skipping subtree: {e}");
                    continue;
                }
            };
            if dir != self.root {
                if let Some(path) = self.tree_path(&dir) {
                    let mut row = FsRow::new(path, 0, dir_mtime, true);
                    row.parent_mtime = parent_mtime;
                    rows.push(row);
                }
            }

            let entry = match cache.get(&dir) {
                Some(cached) if cached.mtime == dir_mtime => cached.clone(),
                _ => match self.scan_dir(&dir, dir_mtime) {
                    Some(entry) => entry,
                    None => continue,
                },
            };
            rows.extend(entry.files.iter().cloned());
            for subdir in &entry.subdirs {
                stack.push((subdir.clone(), Some(dir_mtime)));
            }
            fresh_cache.insert(dir.clone(), entry);
        }
        drop(cache);
        *self.audit_cache.lock() = fresh_cache;
        Ok(Box::new(rows.into_iter()))
    }

    fn watch(&self, tx: mpsc::Sender<WatchEvent>) -> Result<WatchHandle, SourceError> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| SourceError::WatchInit(e.to_string()))?;

        let registry = WatchRegistry::new(watcher, self.watch_limit);
        registry.register(&self.root);
        for entry in WalkDir::new(&self.root).min_depth(1).into_iter().flatten() {
            if entry.file_type().is_dir() {
                registry.register(entry.path());
            }
        }

        // Dispatcher thread: converts raw notifications, applies
        // backpressure on the bounded channel, and maintains the registry.
        // Unwatching happens here, never inside watcher callbacks.
        let dispatcher = {
            let registry = registry.clone();
            let root = self.root.clone();
            let source = FsSource::new(self.root.clone(), self.watch_limit);
            std::thread::spawn(move || {
                while let Ok(res) = raw_rx.recv() {
                    let event = match res {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(root = %root.display(), "watch error: {e}");
                            continue;
                        }
                    };
                    for item in convert(&source, &registry, &event) {
                        if tx.blocking_send(item).is_err() {
                            debug!("watch consumer gone, dispatcher exiting");
                            return;
                        }
                    }
                }
            })
        };

        Ok(WatchHandle::new(Box::new((registry, dispatcher))))
    }

    fn stat(&self, path: &str) -> SentinelResult {
        let abs = self.abs_path(path);
        match std::fs::symlink_metadata(&abs) {
            Ok(meta) => SentinelResult {
                path: path.to_string(),
                exists: true,
                mtime: Some(epoch_secs(meta.modified().ok())),
                size: Some(meta.len()),
            },
            Err(_) => SentinelResult { path: path.to_string(), exists: false, mtime: None, size: None },
        }
    }
}

impl FsSource {
    fn scan_dir(&self, dir: &Path, dir_mtime: f64) -> Option<DirCacheEntry> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), "read_dir failed, skipping: {e}");
                return None;
            }
        };
        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let abs = entry.path();
            let Some(mut row) = self.row(&abs) else { continue };
            if row.is_directory {
                subdirs.push(abs);
            } else {
                row.parent_mtime = Some(dir_mtime);
                files.push(row);
            }
        }
        Some(DirCacheEntry { mtime: dir_mtime, files, subdirs })
    }
}

fn row_from_entry(root: &Path, entry: &walkdir::DirEntry) -> Option<FsRow> {
    let meta = match entry.metadata() {
        Ok(meta) => meta,
        Err(e) => {
            warn!(path = %entry.path().display(), "stat failed, skipping: {e}");
            return None;
        }
    };
    let rel = entry.path().strip_prefix(root).ok()?;
    let path = tree_path::normalize(&rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"));
    let mut row = FsRow::new(path, meta.len(), epoch_secs(meta.modified().ok()), meta.is_dir());
    row.created_time = meta.created().ok().map(|t| epoch_secs(Some(t)));
    Some(row)
}

/// Map one notify event to watch events, maintaining directory watches.
fn convert(source: &FsSource, registry: &WatchRegistry, event: &notify::Event) -> Vec<WatchEvent> {
    use notify::EventKind as NK;
    let mut out = Vec::new();
    for abs in &event.paths {
        if let Some(parent) = abs.parent() {
            registry.touch(parent);
        }
        match &event.kind {
            NK::Create(_) => {
                if let Some(row) = source.row(abs) {
                    if row.is_directory {
                        registry.register(abs);
                    }
                    out.push(WatchEvent { kind: EventKind::Insert, row });
                }
            }
            NK::Modify(kind) => match source.row(abs) {
                Some(row) => out.push(WatchEvent { kind: EventKind::Update, row }),
                // A rename notification whose old name no longer stats is a
                // departure; surface it as a delete.
                None if matches!(kind, notify::event::ModifyKind::Name(_)) => {
                    registry.unregister(abs);
                    if let Some(row) = deleted_row(source, abs) {
                        out.push(WatchEvent { kind: EventKind::Delete, row });
                    }
                }
                None => {}
            },
            NK::Any | NK::Other => {
                if let Some(row) = source.row(abs) {
                    out.push(WatchEvent { kind: EventKind::Update, row });
                }
            }
            NK::Remove(_) => {
                registry.unregister(abs);
                if let Some(row) = deleted_row(source, abs) {
                    out.push(WatchEvent { kind: EventKind::Delete, row });
                }
            }
            NK::Access(_) => {}
        }
    }
    out
}

/// Delete row for a vanished path; the mtime is the observation time.
fn deleted_row(source: &FsSource, abs: &Path) -> Option<FsRow> {
    let path = source.tree_path(abs)?;
    Some(FsRow::new(path, 0, epoch_secs(Some(SystemTime::now())), false))
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
