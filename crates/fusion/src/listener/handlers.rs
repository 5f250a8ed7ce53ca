// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch: one function per protocol surface.
//!
//! Handlers are synchronous; every lock they take is released before the
//! response hits the wire. Arbitration failures become drop reasons inside
//! a `200`-shaped response, auth and protocol failures become typed errors.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use fustor_core::{path, Clock, Event, MessageSource, SessionId, ViewId};
use fustor_wire::{
    ErrorKind, PendingCommand, Request, Response, Role, SentinelResult, SentinelTask,
};
use tracing::{debug, info};

use super::ListenCtx;
use crate::arbiter;
use crate::sessions::SessionError;
use crate::state::PipeHandle;

/// Sentinel tasks handed out per poll.
const MAX_SENTINEL_TASKS: usize = 256;

pub(crate) fn dispatch<C: Clock>(request: Request, ctx: &ListenCtx<C>) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::CreateSession { api_key, agent_id, task_id } => {
            create_session(ctx, &api_key, agent_id, task_id)
        }
        Request::Heartbeat { session_id, status: _ } => heartbeat(ctx, &session_id),
        Request::CloseSession { session_id } => close_session(ctx, &session_id),
        Request::Ingest { session_id, source, events, snapshot_end } => {
            ingest(ctx, &session_id, source, &events, snapshot_end)
        }
        Request::AuditStart { session_id } => audit_control(ctx, &session_id, true),
        Request::AuditEnd { session_id } => audit_control(ctx, &session_id, false),
        Request::SentinelTasks { session_id } => sentinel_tasks(ctx, &session_id),
        Request::SentinelFeedback { session_id, results } => {
            sentinel_feedback(ctx, &session_id, &results)
        }
        Request::Tree { view_id, path, recursive, max_depth, only_path } => {
            tree(ctx, &view_id, path.as_deref(), recursive, max_depth, only_path)
        }
        Request::Stats { view_id } => stats(ctx, &view_id),
        Request::Sessions => Response::Sessions { sessions: ctx.state.sessions.summaries() },
        Request::Status => status(ctx),
        Request::Shutdown => {
            info!("shutdown requested over the wire");
            ctx.shutdown.notify_waiters();
            Response::ShuttingDown
        }
    }
}

fn create_session<C: Clock>(
    ctx: &ListenCtx<C>,
    api_key: &str,
    agent_id: fustor_core::AgentId,
    task_id: String,
) -> Response {
    let Some(pipe) = ctx.state.pipe_by_key(api_key) else {
        return Response::error(ErrorKind::Unauthorized, "unknown api key");
    };
    if !pipe.enabled() {
        return Response::error(ErrorKind::PipeDisabled, format!("pipe {} is stopped", pipe.id));
    }
    let (record, committed_index) = ctx.state.sessions.create(&pipe.id, &agent_id, task_id);
    // First-ever leadership on a pipe with no snapshot yet: ask for one on
    // the next heartbeat.
    if record.role.is_leader() && !pipe.state.read().snapshot_complete {
        ctx.state.sessions.enqueue_command(&record.id, PendingCommand::StartSnapshot);
    }
    Response::SessionCreated {
        session_id: record.id,
        role: record.role,
        leader_deadline_secs: ctx.state.sessions.leader_deadline_secs(&pipe.id),
        committed_index,
    }
}

fn heartbeat<C: Clock>(ctx: &ListenCtx<C>, session_id: &SessionId) -> Response {
    match ctx.state.sessions.heartbeat(session_id) {
        Ok((role, leader_deadline_secs, mut pending_commands)) => {
            // A freshly promoted leader on an unseeded pipe owes a snapshot.
            if role.is_leader() && !pending_commands.contains(&PendingCommand::StartSnapshot) {
                if let Ok(record) = ctx.state.sessions.get(session_id) {
                    if let Some(pipe) = ctx.state.pipe(&record.pipe_id) {
                        if !pipe.state.read().snapshot_complete {
                            pending_commands.push(PendingCommand::StartSnapshot);
                        }
                    }
                }
            }
            Response::HeartbeatAck { role, leader_deadline_secs, pending_commands }
        }
        Err(e) => session_error(e),
    }
}

fn close_session<C: Clock>(ctx: &ListenCtx<C>, session_id: &SessionId) -> Response {
    if ctx.state.sessions.close(session_id).is_some() {
        ctx.state.skew.forget_session(session_id);
        debug!(session = %session_id, "session closed");
    }
    Response::Ok
}

fn ingest<C: Clock>(
    ctx: &ListenCtx<C>,
    session_id: &SessionId,
    source: MessageSource,
    events: &[Event],
    snapshot_end: bool,
) -> Response {
    let record = match ctx.state.sessions.get(session_id) {
        Ok(record) => record,
        Err(e) => return session_error(e),
    };
    let Some(pipe) = ctx.state.pipe(&record.pipe_id) else {
        return Response::error(ErrorKind::Internal, "session references unknown pipe");
    };
    if !pipe.enabled() {
        return Response::error(ErrorKind::PipeDisabled, format!("pipe {} is stopped", pipe.id));
    }
    // Followers may push realtime only; scan streams come from the leader.
    if source != MessageSource::Realtime && !record.role.is_leader() {
        return Response::error(ErrorKind::NotLeader, "snapshot and audit require leadership");
    }
    if source == MessageSource::Realtime && !record.can_realtime {
        return Response::error(ErrorKind::BadRequest, "session not cleared for realtime");
    }
    let cap = pipe.consistency.ingest_queue_cap;
    if pipe.ingest_pending.load(Ordering::Acquire) >= cap {
        return Response::error(ErrorKind::Busy, "ingest queue full, back off");
    }

    pipe.ingest_pending.fetch_add(1, Ordering::AcqRel);
    let committed_before = ctx.state.sessions.committed(&pipe.id, &record.agent_id);
    let wall = ctx.state.clock.epoch_secs();
    let outcome = {
        let mut view = pipe.state.write();
        let outcome = arbiter::apply_batch(
            &mut view,
            &ctx.state.skew,
            &pipe.consistency,
            &pipe.schema,
            wall,
            events,
            committed_before,
        );
        if snapshot_end && !view.snapshot_complete {
            info!(pipe = %pipe.id, "snapshot complete");
            view.snapshot_complete = true;
        }
        outcome
    };
    let committed_index =
        ctx.state.sessions.commit(&pipe.id, &record.agent_id, outcome.max_index);
    pipe.ingest_pending.fetch_sub(1, Ordering::AcqRel);

    let snapshot_needed = record.role.is_leader() && !pipe.state.read().snapshot_complete;
    Response::Ingested {
        committed_index,
        accepted: outcome.accepted,
        dropped: outcome.dropped,
        role: record.role,
        snapshot_needed,
    }
}

fn audit_control<C: Clock>(ctx: &ListenCtx<C>, session_id: &SessionId, start: bool) -> Response {
    let (pipe, _) = match leader_pipe(ctx, session_id) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    let wall = ctx.state.clock.epoch_secs();
    let mut view = pipe.state.write();
    if start {
        arbiter::audit_start(&mut view, &ctx.state.skew, wall);
        info!(pipe = %pipe.id, "audit cycle started");
    } else {
        let summary = arbiter::audit_end(&mut view, &ctx.state.skew, wall);
        info!(
            pipe = %pipe.id,
            marked_missing = summary.marked_missing,
            blind_spots = summary.blind_spots,
            tombstones_cleared = summary.tombstones_cleared,
            "audit cycle closed"
        );
    }
    Response::Ok
}

fn sentinel_tasks<C: Clock>(ctx: &ListenCtx<C>, session_id: &SessionId) -> Response {
    let (pipe, _) = match leader_pipe(ctx, session_id) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    let tasks: Vec<SentinelTask> = pipe
        .state
        .read()
        .suspects
        .paths()
        .into_iter()
        .take(MAX_SENTINEL_TASKS)
        .map(|path| SentinelTask { path })
        .collect();
    Response::SentinelTaskList { tasks }
}

fn sentinel_feedback<C: Clock>(
    ctx: &ListenCtx<C>,
    session_id: &SessionId,
    results: &[SentinelResult],
) -> Response {
    let (pipe, _) = match leader_pipe(ctx, session_id) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    let wall = ctx.state.clock.epoch_secs();
    let mut view = pipe.state.write();
    arbiter::apply_sentinel(&mut view, &ctx.state.skew, &pipe.consistency, wall, results);
    Response::Ok
}

fn tree<C: Clock>(
    ctx: &ListenCtx<C>,
    view_id: &ViewId,
    target: Option<&str>,
    recursive: bool,
    max_depth: Option<usize>,
    only_path: bool,
) -> Response {
    let Some(pipe) = ctx.state.pipe_by_view(view_id) else {
        return Response::error(ErrorKind::BadRequest, format!("unknown view {view_id}"));
    };
    if let Err(reason) = pipe.readiness(ctx.state.sessions.leader_session_alive(&pipe.id)) {
        return Response::Unavailable { reason };
    }
    let normalized = path::normalize(target.unwrap_or(path::ROOT));
    let result = pipe.state.read().tree.subtree(&normalized, recursive, max_depth, only_path);
    match result {
        Some(root) => Response::Tree { root },
        None => Response::error(ErrorKind::BadRequest, format!("unknown path {normalized}")),
    }
}

fn stats<C: Clock>(ctx: &ListenCtx<C>, view_id: &ViewId) -> Response {
    let Some(pipe) = ctx.state.pipe_by_view(view_id) else {
        return Response::error(ErrorKind::BadRequest, format!("unknown view {view_id}"));
    };
    let mut stats = pipe.state.read().stats();
    match pipe.readiness(ctx.state.sessions.leader_session_alive(&pipe.id)) {
        Ok(()) => stats.ready = true,
        Err(reason) => {
            stats.ready = false;
            stats.not_ready_reason = Some(reason);
        }
    }
    Response::Stats { stats }
}

fn status<C: Clock>(ctx: &ListenCtx<C>) -> Response {
    let uptime = ctx.state.clock.now().duration_since(ctx.state.start_time);
    Response::Status {
        uptime_secs: uptime.as_secs(),
        pipes: ctx.state.pipe_count(),
        views: ctx.state.view_count(),
        sessions: ctx.state.sessions.session_count(),
    }
}

/// Resolve a session to its pipe, requiring leadership.
fn leader_pipe<C: Clock>(
    ctx: &ListenCtx<C>,
    session_id: &SessionId,
) -> Result<(Arc<PipeHandle>, Role), Response> {
    let record = ctx.state.sessions.get(session_id).map_err(session_error)?;
    if !record.role.is_leader() {
        return Err(Response::error(ErrorKind::NotLeader, "operation requires the pipe leader"));
    }
    let pipe = ctx
        .state
        .pipe(&record.pipe_id)
        .ok_or_else(|| Response::error(ErrorKind::Internal, "session references unknown pipe"))?;
    Ok((pipe, record.role))
}

fn session_error(e: SessionError) -> Response {
    match e {
        SessionError::SessionUnknown => {
            Response::error(ErrorKind::SessionUnknown, "session unknown or expired")
        }
        SessionError::NotLeader => {
            Response::error(ErrorKind::NotLeader, "operation requires the pipe leader")
        }
    }
}
