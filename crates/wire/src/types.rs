// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO structs for the wire protocol.

use std::collections::HashMap;

use fustor_core::{AgentId, PipeId, SessionId};
use serde::{Deserialize, Serialize};

use fustor_core::simple_display;

/// Per-pipe role of a session. Only the leader may push snapshot and audit
/// streams or run sentinel verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
}

simple_display! {
    Role {
        Leader => "leader",
        Follower => "follower",
    }
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

/// Why an event was not applied. Arbitration outcomes are accounted and
/// returned to the sender, never surfaced as request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// A live tombstone at the path forbade re-insertion.
    Tombstoned,
    /// Audit row lost the mtime race against the stored node.
    StaleMtime,
    /// Audit row's parent mtime lagged the tree beyond the trust window.
    StaleAudit,
    /// Snapshot row for a path that already exists; snapshots never overwrite.
    SnapshotExisting,
    /// DELETE on a non-realtime stream; only audit-end may mark absence.
    NonRealtimeDelete,
    /// Event index at or below the committed offset; acknowledged, not applied.
    DuplicateIndex,
    /// Event schema does not match the pipe's schema.
    SchemaMismatch,
}

simple_display! {
    DropReason {
        Tombstoned => "tombstoned",
        StaleMtime => "stale_mtime",
        StaleAudit => "stale_audit",
        SnapshotExisting => "snapshot_existing",
        NonRealtimeDelete => "non_realtime_delete",
        DuplicateIndex => "duplicate_index",
        SchemaMismatch => "schema_mismatch",
    }
}

/// One dropped event within an otherwise accepted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dropped {
    pub index: u64,
    pub reason: DropReason,
}

/// Why a view query returned 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    SnapshotIncomplete,
    QueueDraining,
    NoLeader,
}

simple_display! {
    NotReadyReason {
        SnapshotIncomplete => "snapshot_incomplete",
        QueueDraining => "queue_draining",
        NoLeader => "no_leader",
    }
}

/// Error kinds carried on wire-level error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    PipeDisabled,
    SessionUnknown,
    NotLeader,
    Busy,
    BadRequest,
    Internal,
}

simple_display! {
    ErrorKind {
        Unauthorized => "unauthorized",
        PipeDisabled => "pipe_disabled",
        SessionUnknown => "session_unknown",
        NotLeader => "not_leader",
        Busy => "busy",
        BadRequest => "bad_request",
        Internal => "internal",
    }
}

/// Management command queued for delivery on the next heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCommand {
    StartSnapshot,
    StartAudit,
    Stop,
}

/// Optional agent-side status piggybacked on heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    /// Pipe state rendered as `RUNNING|MESSAGE|AUDIT` etc.
    pub pipe_state: String,
    /// Events queued behind the batcher.
    pub queued: usize,
}

/// Sentinel verification task handed to the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelTask {
    pub path: String,
}

/// Result of one sentinel `stat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelResult {
    pub path: String,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A node projected for query responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub integrity_suspect: bool,
    #[serde(default)]
    pub agent_missing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

/// Counters and readiness for one view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewStats {
    pub nodes: usize,
    pub dirs: usize,
    pub files: usize,
    pub tombstones: usize,
    pub suspects: usize,
    pub blind_spots: usize,
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub drops_by_reason: HashMap<String, u64>,
    /// Microseconds spent applying the most recent batch.
    pub last_apply_micros: u64,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_ready_reason: Option<NotReadyReason>,
}

/// Summary of a live session for `fustor status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub pipe_id: PipeId,
    pub agent_id: AgentId,
    pub role: Role,
    pub age_secs: f64,
    pub committed_index: u64,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
