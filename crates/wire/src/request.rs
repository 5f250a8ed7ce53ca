// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fustor_core::{AgentId, Event, MessageSource, SessionId, ViewId};
use serde::{Deserialize, Serialize};

use super::types::{AgentStatusReport, SentinelResult};

/// Request from an Agent or the CLI to the Fusion daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Create a session on the pipe the api key resolves to
    CreateSession {
        api_key: String,
        agent_id: AgentId,
        /// Opaque to the core; by convention `agent_id:pipe_id`
        task_id: String,
    },

    /// Refresh a session, learn the current role, drain queued commands
    Heartbeat {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<AgentStatusReport>,
    },

    /// Close a session (idempotent)
    CloseSession { session_id: SessionId },

    /// Push a batch of events. The whole batch is acknowledged with a new
    /// committed index or retried as-is; there is no partial acceptance.
    Ingest {
        session_id: SessionId,
        source: MessageSource,
        events: Vec<Event>,
        /// True on the final batch of a snapshot scan
        #[serde(default)]
        snapshot_end: bool,
    },

    /// Begin an audit epoch on the session's pipe (leader only)
    AuditStart { session_id: SessionId },

    /// Close the audit epoch (leader only)
    AuditEnd { session_id: SessionId },

    /// Poll verification tasks for suspect paths (leader only)
    SentinelTasks { session_id: SessionId },

    /// Submit verification results (leader only)
    SentinelFeedback {
        session_id: SessionId,
        results: Vec<SentinelResult>,
    },

    /// Query a view's tree
    Tree {
        view_id: ViewId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default)]
        recursive: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        /// Return bare paths without stat fields
        #[serde(default)]
        only_path: bool,
    },

    /// Query a view's counters and readiness
    Stats { view_id: ViewId },

    /// List live sessions
    Sessions,

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
