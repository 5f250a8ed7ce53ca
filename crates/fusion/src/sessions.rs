// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry and per-pipe leader election.
//!
//! Election is first-come-first-served: the first live session on a pipe
//! leads. Leadership carries a TTL of `leader_timeout`; once the leader's
//! heartbeat goes stale, the next session to heartbeat takes over and the
//! incumbent is demoted. Roles travel on every response so clients converge
//! without explicit notification.
//!
//! Committed offsets are keyed by `(pipe_id, agent_id)`, not by session, so
//! a crashed agent resumes exactly where its last acknowledged batch ended.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use fustor_core::{AgentId, Clock, Consistency, PipeId, SessionId};
use fustor_wire::{PendingCommand, Role, SessionSummary};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session unknown or expired")]
    SessionUnknown,

    #[error("operation requires the pipe leader")]
    NotLeader,
}

/// One live session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub pipe_id: PipeId,
    pub agent_id: AgentId,
    pub task_id: String,
    pub role: Role,
    pub created_at: Instant,
    pub last_heartbeat: Instant,
    pub can_realtime: bool,
    pending: VecDeque<PendingCommand>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    leaders: HashMap<PipeId, SessionId>,
    offsets: HashMap<(PipeId, AgentId), u64>,
}

/// Registry of sessions across all pipes.
pub struct SessionManager<C: Clock> {
    clock: C,
    tuning: HashMap<PipeId, Consistency>,
    inner: Mutex<Inner>,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(clock: C, tuning: HashMap<PipeId, Consistency>) -> Self {
        Self { clock, tuning, inner: Mutex::new(Inner::default()) }
    }

    fn cons(&self, pipe: &PipeId) -> &Consistency {
        // Pipes are registered at startup; unknown ids only appear in tests.
        static DEFAULT: std::sync::OnceLock<Consistency> = std::sync::OnceLock::new();
        self.tuning.get(pipe).unwrap_or_else(|| DEFAULT.get_or_init(Consistency::default))
    }

    /// Create a session on `pipe`. Never blocks other creations.
    ///
    /// Returns the created record and the committed offset for
    /// `(pipe, agent)` so the sender can resume.
    pub fn create(&self, pipe: &PipeId, agent: &AgentId, task_id: String) -> (SessionRecord, u64) {
        let now = self.clock.now();
        let leader_timeout = Duration::from_secs_f64(self.cons(pipe).leader_timeout_secs());
        let mut inner = self.inner.lock();

        let leader_fresh = leader_alive(&inner, pipe, now, leader_timeout);
        let role = if leader_fresh { Role::Follower } else { Role::Leader };

        let record = SessionRecord {
            id: SessionId::generate(),
            pipe_id: pipe.clone(),
            agent_id: agent.clone(),
            task_id,
            role,
            created_at: now,
            last_heartbeat: now,
            can_realtime: true,
            pending: VecDeque::new(),
        };
        if role.is_leader() {
            if let Some(old) = inner.leaders.insert(pipe.clone(), record.id.clone()) {
                demote(&mut inner, &old);
            }
            info!(pipe = %pipe, session = %record.id, agent = %agent, "session elected leader");
        } else {
            debug!(pipe = %pipe, session = %record.id, agent = %agent, "session joins as follower");
        }
        let committed = inner.offsets.get(&(pipe.clone(), agent.clone())).copied().unwrap_or(0);
        inner.sessions.insert(record.id.clone(), record.clone());
        (record, committed)
    }

    /// Refresh a session. May promote the caller if the leader's lease has
    /// lapsed. Returns role, seconds left on the leadership lease, and any
    /// queued management commands.
    pub fn heartbeat(
        &self,
        session: &SessionId,
    ) -> Result<(Role, f64, Vec<PendingCommand>), SessionError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let (pipe, session_fresh) = {
            let record = inner.sessions.get(session).ok_or(SessionError::SessionUnknown)?;
            let ttl = Duration::from_secs_f64(self.cons(&record.pipe_id).session_ttl_secs);
            (record.pipe_id.clone(), now.duration_since(record.last_heartbeat) < ttl)
        };
        if !session_fresh {
            self.drop_session(&mut inner, session);
            return Err(SessionError::SessionUnknown);
        }

        let leader_timeout = Duration::from_secs_f64(self.cons(&pipe).leader_timeout_secs());
        if !leader_alive(&inner, &pipe, now, leader_timeout) {
            let incumbent = inner.leaders.insert(pipe.clone(), session.clone());
            if let Some(old) = incumbent {
                if old != *session {
                    demote(&mut inner, &old);
                }
            }
            if let Some(record) = inner.sessions.get_mut(session) {
                if !record.role.is_leader() {
                    info!(pipe = %pipe, session = %session, "follower promoted to leader");
                }
                record.role = Role::Leader;
            }
        }

        let record = inner.sessions.get_mut(session).ok_or(SessionError::SessionUnknown)?;
        record.last_heartbeat = now;
        let role = record.role;
        let commands: Vec<PendingCommand> = record.pending.drain(..).collect();
        let deadline = leader_deadline(&inner, &pipe, now, leader_timeout);
        Ok((role, deadline, commands))
    }

    /// Close a session. Idempotent.
    pub fn close(&self, session: &SessionId) -> Option<SessionRecord> {
        let mut inner = self.inner.lock();
        self.drop_session(&mut inner, session)
    }

    /// Current record for a session, or `SessionUnknown`.
    pub fn get(&self, session: &SessionId) -> Result<SessionRecord, SessionError> {
        self.inner.lock().sessions.get(session).cloned().ok_or(SessionError::SessionUnknown)
    }

    /// Advance the committed offset for `(pipe, agent)`. Never regresses.
    pub fn commit(&self, pipe: &PipeId, agent: &AgentId, index: u64) -> u64 {
        let mut inner = self.inner.lock();
        let entry = inner.offsets.entry((pipe.clone(), agent.clone())).or_insert(0);
        *entry = (*entry).max(index);
        *entry
    }

    pub fn committed(&self, pipe: &PipeId, agent: &AgentId) -> u64 {
        self.inner.lock().offsets.get(&(pipe.clone(), agent.clone())).copied().unwrap_or(0)
    }

    /// Whether the pipe currently has a leader within its lease.
    pub fn leader_session_alive(&self, pipe: &PipeId) -> bool {
        let now = self.clock.now();
        let leader_timeout = Duration::from_secs_f64(self.cons(pipe).leader_timeout_secs());
        leader_alive(&self.inner.lock(), pipe, now, leader_timeout)
    }

    /// Seconds remaining on the pipe's leadership lease.
    pub fn leader_deadline_secs(&self, pipe: &PipeId) -> f64 {
        let now = self.clock.now();
        let leader_timeout = Duration::from_secs_f64(self.cons(pipe).leader_timeout_secs());
        leader_deadline(&self.inner.lock(), pipe, now, leader_timeout)
    }

    /// Queue a management command for delivery on the session's next heartbeat.
    pub fn enqueue_command(&self, session: &SessionId, command: PendingCommand) -> bool {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(session) {
            Some(record) => {
                record.pending.push_back(command);
                true
            }
            None => false,
        }
    }

    /// Expire sessions whose heartbeat is older than the pipe's session TTL.
    /// Returns the expired records so callers can release per-session state.
    pub fn expire_idle(&self) -> Vec<SessionRecord> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let stale: Vec<SessionId> = inner
            .sessions
            .values()
            .filter(|r| {
                let ttl = Duration::from_secs_f64(self.cons(&r.pipe_id).session_ttl_secs);
                now.duration_since(r.last_heartbeat) >= ttl
            })
            .map(|r| r.id.clone())
            .collect();
        stale.iter().filter_map(|id| self.drop_session(&mut inner, id)).collect()
    }

    /// Summaries for `fustor status`.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .sessions
            .values()
            .map(|r| SessionSummary {
                session_id: r.id.clone(),
                pipe_id: r.pipe_id.clone(),
                agent_id: r.agent_id.clone(),
                role: r.role,
                age_secs: now.duration_since(r.created_at).as_secs_f64(),
                committed_index: inner
                    .offsets
                    .get(&(r.pipe_id.clone(), r.agent_id.clone()))
                    .copied()
                    .unwrap_or(0),
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    fn drop_session(&self, inner: &mut Inner, session: &SessionId) -> Option<SessionRecord> {
        let record = inner.sessions.remove(session)?;
        if inner.leaders.get(&record.pipe_id) == Some(session) {
            inner.leaders.remove(&record.pipe_id);
            debug!(pipe = %record.pipe_id, session = %session, "leader session dropped");
        }
        Some(record)
    }
}

fn leader_alive(inner: &Inner, pipe: &PipeId, now: Instant, leader_timeout: Duration) -> bool {
    inner
        .leaders
        .get(pipe)
        .and_then(|id| inner.sessions.get(id))
        .is_some_and(|leader| now.duration_since(leader.last_heartbeat) <= leader_timeout)
}

fn leader_deadline(inner: &Inner, pipe: &PipeId, now: Instant, leader_timeout: Duration) -> f64 {
    inner
        .leaders
        .get(pipe)
        .and_then(|id| inner.sessions.get(id))
        .map(|leader| {
            let elapsed = now.duration_since(leader.last_heartbeat);
            (leader_timeout.saturating_sub(elapsed)).as_secs_f64()
        })
        .unwrap_or(0.0)
}

fn demote(inner: &mut Inner, session: &SessionId) {
    if let Some(record) = inner.sessions.get_mut(session) {
        record.role = Role::Follower;
        debug!(session = %session, "incumbent leader demoted");
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
