// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source capability record.
//!
//! A source exposes four capabilities: a snapshot scan, an audit scan
//! (rows carry the containing directory's mtime), a realtime change
//! stream, and a point `stat` for sentinel verification. The pipe runtime
//! depends only on this trait; the filesystem driver is one implementation.

use fustor_core::{EventKind, FsRow};
use fustor_wire::SentinelResult;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from a source driver. Path-level failures are handled inside the
/// driver (skip + warn); these surface only for whole-capability failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot initialize watcher: {0}")]
    WatchInit(String),
}

/// One realtime observation from the change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub row: FsRow,
}

/// Handle keeping a realtime watch alive; dropping it stops the stream.
pub struct WatchHandle {
    // Owns the platform watcher and any worker threads.
    _guard: Box<dyn std::any::Any + Send>,
}

impl WatchHandle {
    pub fn new(guard: Box<dyn std::any::Any + Send>) -> Self {
        Self { _guard: guard }
    }
}

/// A pull stream of scan rows with an explicit close (drop).
pub type RowStream = Box<dyn Iterator<Item = FsRow> + Send>;

/// Capability record for a watched data source.
pub trait Source: Send + Sync + 'static {
    /// Full scan, no parent mtimes. Used to seed the view.
    fn snapshot_scan(&self) -> Result<RowStream, SourceError>;

    /// Full scan with `parent_mtime` on every row. Used by audit cycles.
    fn audit_scan(&self) -> Result<RowStream, SourceError>;

    /// Start the realtime stream into `tx`. The stream applies backpressure
    /// when the channel is full.
    fn watch(&self, tx: mpsc::Sender<WatchEvent>) -> Result<WatchHandle, SourceError>;

    /// Point verification of one path, by normalized tree path.
    fn stat(&self, path: &str) -> SentinelResult;
}
