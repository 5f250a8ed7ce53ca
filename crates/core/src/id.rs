// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for pipes, agents, sessions, and views.
//!
//! A pipe is a configured source→view binding on the Fusion side; an agent
//! is one daemon instance on a mounting node. A session is the handle one
//! agent holds against one pipe, and is the only thing the server may
//! terminate. Views are the queryable trees pipes feed into.

use crate::string_id;

string_id! {
    /// Identifies a configured pipe on the Fusion server.
    PipeId
}

string_id! {
    /// Identifies one Agent daemon instance (stable across restarts).
    AgentId
}

string_id! {
    /// Identifies a live session between an Agent and a pipe.
    ///
    /// Sessions are ephemeral: a new one is minted on every (re)connect.
    /// Committed offsets are keyed by `(PipeId, AgentId)` instead so they
    /// survive session churn.
    SessionId
}

string_id! {
    /// Identifies a queryable view served by Fusion.
    ViewId
}

impl SessionId {
    /// Mint a fresh session id: `ses-` prefix + 19-char nanoid.
    pub fn generate() -> Self {
        Self(format!("ses-{}", nanoid::nanoid!(19)))
    }
}

/// Task id convention: `agent_id:pipe_id`. Opaque to the consistency core.
pub fn task_id(agent: &AgentId, pipe: &PipeId) -> String {
    format!("{}:{}", agent, pipe)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
