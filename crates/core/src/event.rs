// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event model shared by Agents and Fusion.
//!
//! Three stream kinds feed the same ingestion path with strict precedence
//! realtime ≻ audit ≻ snapshot. Events carry fractional-second mtimes as
//! observed on the emitting node; arbitration against skew happens on the
//! Fusion side.

use serde::{Deserialize, Serialize};

use crate::id::{AgentId, SessionId};
use crate::simple_display;

/// Schema name of the built-in filesystem source.
pub const FS_SCHEMA: &str = "fs";

/// What happened to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

simple_display! {
    EventKind {
        Insert => "INSERT",
        Update => "UPDATE",
        Delete => "DELETE",
    }
}

/// Which stream produced an event.
///
/// Precedence is absolute: a realtime observation beats an audit row, which
/// beats a snapshot row, regardless of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Realtime,
    Audit,
    Snapshot,
}

impl MessageSource {
    /// Numeric precedence, higher wins.
    pub fn precedence(&self) -> u8 {
        match self {
            MessageSource::Realtime => 2,
            MessageSource::Audit => 1,
            MessageSource::Snapshot => 0,
        }
    }
}

simple_display! {
    MessageSource {
        Realtime => "realtime",
        Audit => "audit",
        Snapshot => "snapshot",
    }
}

/// One observed mutation of the watched tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Schema of the emitting source (`"fs"` for filesystem pipes).
    pub schema: String,
    pub kind: EventKind,
    /// Normalized absolute path, `/`-separated, rooted at the watched root.
    pub path: String,
    /// Modification time in epoch seconds as seen by the emitting node.
    pub mtime: f64,
    pub size: u64,
    pub is_dir: bool,
    /// Creation time where the source filesystem exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctime: Option<f64>,
    /// Containing directory's mtime captured at scan time. Audit rows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_mtime: Option<f64>,
    /// Monotonically increasing per-session offset, used for resume.
    pub index: u64,
    pub source: MessageSource,
    pub session_id: SessionId,
    pub agent_id: AgentId,
}

/// Event row of the filesystem schema as it leaves the source driver,
/// before index/session assignment and field projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsRow {
    pub path: String,
    pub file_name: String,
    pub size: u64,
    pub modified_time: f64,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_mtime: Option<f64>,
}

impl FsRow {
    /// Build a row from path + stat fields, deriving `file_name` and
    /// `parent_path` from the path.
    pub fn new(path: impl Into<String>, size: u64, modified_time: f64, is_directory: bool) -> Self {
        let path = path.into();
        let file_name = crate::path::node_name(&path).to_string();
        let parent_path = crate::path::parent(&path).map(str::to_string);
        Self {
            path,
            file_name,
            size,
            modified_time,
            is_directory,
            created_time: None,
            parent_path,
            parent_mtime: None,
        }
    }

    pub fn with_parent_mtime(mut self, mtime: f64) -> Self {
        self.parent_mtime = Some(mtime);
        self
    }

    /// Promote this row into an [`Event`] for the given stream.
    pub fn into_event(
        self,
        kind: EventKind,
        source: MessageSource,
        index: u64,
        session_id: SessionId,
        agent_id: AgentId,
    ) -> Event {
        Event {
            schema: FS_SCHEMA.to_string(),
            kind,
            path: self.path,
            mtime: self.modified_time,
            size: self.size,
            is_dir: self.is_directory,
            ctime: self.created_time,
            parent_mtime: self.parent_mtime,
            index,
            source,
            session_id,
            agent_id,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
