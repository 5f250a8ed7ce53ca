// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fustor_core::SessionId;
use serde::{Deserialize, Serialize};

use super::types::{
    Dropped, ErrorKind, NodeView, NotReadyReason, PendingCommand, Role, SentinelTask,
    SessionSummary, ViewStats,
};

/// Response from the Fusion daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Daemon is shutting down
    ShuttingDown,

    /// Session allocated
    SessionCreated {
        session_id: SessionId,
        role: Role,
        /// Seconds until the current leadership lease expires
        leader_deadline_secs: f64,
        /// Resume point for `(pipe_id, agent_id)`; streaming starts after it
        committed_index: u64,
    },

    /// Heartbeat acknowledged
    HeartbeatAck {
        role: Role,
        leader_deadline_secs: f64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pending_commands: Vec<PendingCommand>,
    },

    /// Batch ingested (including batches fully dropped by arbitration)
    Ingested {
        committed_index: u64,
        accepted: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dropped: Vec<Dropped>,
        role: Role,
        /// Server wants a (first) snapshot from this session
        #[serde(default)]
        snapshot_needed: bool,
    },

    /// Sentinel tasks for the leader
    SentinelTaskList { tasks: Vec<SentinelTask> },

    /// Subtree query result
    Tree { root: NodeView },

    /// View counters
    Stats { stats: ViewStats },

    /// Live session listing
    Sessions { sessions: Vec<SessionSummary> },

    /// Daemon status
    Status {
        uptime_secs: u64,
        pipes: usize,
        views: usize,
        sessions: usize,
    },

    /// View not ready; retry later
    Unavailable { reason: NotReadyReason },

    /// Error response
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Convenience constructor used by every handler's error path.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
