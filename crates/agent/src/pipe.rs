// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe runtime: the agent-side state machine.
//!
//! States compose as a bit-set: a healthy pipe is `RUNNING|MESSAGE`, grows
//! a `SNAPSHOT` or `AUDIT` overlay while a scan streams alongside realtime
//! ("message-first": realtime latency is never blocked by a scan), and a
//! `RECONNECTING` overlay while backoff is in progress. Resume is strictly
//! offset-based: streaming starts after the committed index the server
//! returns at session creation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fustor_core::{task_id, AgentId, Event, EventKind, FsRow, MessageSource, SessionId};
use fustor_wire::{PendingCommand, Role, SentinelResult};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::batch::Batcher;
use crate::config::AgentPipeConfig;
use crate::sender::{Client, ClientError, IngestAck, SessionGrant, Transport};
use crate::source::{Source, SourceError, WatchEvent};

bitflags::bitflags! {
    /// Composable pipe states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PipeState: u16 {
        const INITIALIZING  = 1 << 0;
        const RUNNING       = 1 << 1;
        const SNAPSHOT      = 1 << 2;
        const MESSAGE       = 1 << 3;
        const AUDIT         = 1 << 4;
        const RECONNECTING  = 1 << 5;
        const DRAINING      = 1 << 6;
        const STOPPING      = 1 << 7;
        const STOPPED       = 1 << 8;
        const ERROR         = 1 << 9;
        const CONF_OUTDATED = 1 << 10;
        const PAUSED        = 1 << 11;
    }
}

impl fmt::Display for PipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (PipeState::INITIALIZING, "INITIALIZING"),
            (PipeState::RUNNING, "RUNNING"),
            (PipeState::SNAPSHOT, "SNAPSHOT"),
            (PipeState::MESSAGE, "MESSAGE"),
            (PipeState::AUDIT, "AUDIT"),
            (PipeState::RECONNECTING, "RECONNECTING"),
            (PipeState::DRAINING, "DRAINING"),
            (PipeState::STOPPING, "STOPPING"),
            (PipeState::STOPPED, "STOPPED"),
            (PipeState::ERROR, "ERROR"),
            (PipeState::CONF_OUTDATED, "CONF_OUTDATED"),
            (PipeState::PAUSED, "PAUSED"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "NONE")?;
        }
        Ok(())
    }
}

/// Pipe-fatal errors. Transient trouble is absorbed by backoff; these end
/// the run.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("gave up after {attempts} reconnect attempts")]
    Exhausted { attempts: u32 },

    #[error("stopped")]
    Cancelled,

    /// Leadership lost mid-scan; the overlay task ends, the pipe lives on.
    #[error("demoted to follower")]
    Demoted,
}

struct Shared {
    state: Mutex<PipeState>,
    session: Mutex<SessionId>,
    role: Mutex<Role>,
    next_index: AtomicU64,
    snapshot_running: Mutex<bool>,
}

/// One source→server pipe.
pub struct Pipe<S: Source, T: Transport> {
    config: AgentPipeConfig,
    agent_id: AgentId,
    source: Arc<S>,
    client: Client<T>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
}

impl<S: Source, T: Transport> Pipe<S, T> {
    pub fn new(
        config: AgentPipeConfig,
        agent_id: AgentId,
        source: S,
        client: Client<T>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            agent_id,
            source: Arc::new(source),
            client,
            cancel: CancellationToken::new(),
            shared: Arc::new(Shared {
                state: Mutex::new(PipeState::STOPPED),
                session: Mutex::new(SessionId::new("")),
                role: Mutex::new(Role::Follower),
                next_index: AtomicU64::new(1),
                snapshot_running: Mutex::new(false),
            }),
        })
    }

    pub fn state(&self) -> PipeState {
        *self.shared.state.lock()
    }

    pub fn role(&self) -> Role {
        *self.shared.role.lock()
    }

    /// Request a stop: interrupts backoff sleeps, finishes the in-flight
    /// batch, closes the session.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Overlay for config hot-reload: the pipe finishes its current batch,
    /// then the supervisor re-initializes it against the new config.
    pub fn mark_conf_outdated(&self) {
        self.set(PipeState::CONF_OUTDATED, true);
        self.cancel.cancel();
    }

    fn set(&self, flag: PipeState, on: bool) {
        let mut state = self.shared.state.lock();
        state.set(flag, on);
    }

    fn replace_state(&self, new: PipeState) {
        *self.shared.state.lock() = new;
    }

    fn session(&self) -> SessionId {
        self.shared.session.lock().clone()
    }

    /// Run until stopped or fatally errored.
    pub async fn run(self: &Arc<Self>) -> Result<(), PipeError> {
        self.replace_state(PipeState::INITIALIZING);
        info!(pipe = %self.config.name, "pipe starting");

        let grant = match self.establish().await {
            Ok(grant) => grant,
            Err(e) => {
                self.replace_state(PipeState::ERROR);
                return Err(e);
            }
        };
        self.adopt(&grant);

        // Message-first: the realtime stream starts before any snapshot.
        let (watch_tx, watch_rx) = mpsc::channel(self.config.consistency.batch_size.max(64) * 2);
        let watch_handle = match self.source.watch(watch_tx) {
            Ok(handle) => handle,
            Err(e) => {
                self.replace_state(PipeState::ERROR);
                return Err(e.into());
            }
        };
        self.replace_state(PipeState::RUNNING | PipeState::MESSAGE);

        let result = self.drive(watch_rx).await;
        drop(watch_handle);

        match result {
            Ok(()) | Err(PipeError::Cancelled) => {
                self.shutdown().await;
                Ok(())
            }
            Err(e) => {
                error!(pipe = %self.config.name, "pipe failed: {e}");
                self.replace_state(PipeState::ERROR);
                Err(e)
            }
        }
    }

    fn adopt(&self, grant: &SessionGrant) {
        *self.shared.session.lock() = grant.session_id.clone();
        *self.shared.role.lock() = grant.role;
        let resume = grant.committed_index + 1;
        let current = self.shared.next_index.load(Ordering::Relaxed);
        self.shared.next_index.store(current.max(resume), Ordering::Relaxed);
        info!(
            pipe = %self.config.name,
            session = %grant.session_id,
            role = %grant.role,
            committed = grant.committed_index,
            "session established"
        );
    }

    /// Create a session, retrying transport failures with backoff.
    async fn establish(&self) -> Result<SessionGrant, PipeError> {
        let task = task_id(&self.agent_id, &fustor_core::PipeId::new(self.config.name.clone()));
        let mut backoff = Backoff::default();
        loop {
            match self.client.create_session(&self.config.api_key, &self.agent_id, &task).await {
                Ok(grant) => {
                    self.set(PipeState::RECONNECTING, false);
                    return Ok(grant);
                }
                Err(e) if e.retryable() => {
                    self.set(PipeState::RECONNECTING, true);
                    self.sleep_backoff(&mut backoff, &e).await?;
                }
                Err(e) => {
                    error!(pipe = %self.config.name, "session creation rejected: {e}");
                    return Err(PipeError::Exhausted { attempts: backoff.attempt() });
                }
            }
        }
    }

    async fn sleep_backoff(&self, backoff: &mut Backoff, cause: &ClientError) -> Result<(), PipeError> {
        let Some(delay) = backoff.next() else {
            return Err(PipeError::Exhausted { attempts: backoff.attempt() });
        };
        warn!(
            pipe = %self.config.name,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "transport trouble, backing off: {cause}"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.cancel.cancelled() => Err(PipeError::Cancelled),
        }
    }

    async fn drive(self: &Arc<Self>, mut watch_rx: mpsc::Receiver<WatchEvent>) -> Result<(), PipeError> {
        let cons = &self.config.consistency;
        let mut batcher = Batcher::new(cons.batch_size);
        let mut flush_tick = tokio::time::interval(cons.batch_interval());
        let mut hb_tick = tokio::time::interval(cons.heartbeat());
        let period = cons.audit_interval();
        let mut audit_tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let period = cons.sentinel_interval();
        let mut sentinel_tick =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                maybe = watch_rx.recv() => {
                    let Some(observed) = maybe else {
                        error!(pipe = %self.config.name, "realtime stream closed");
                        return Err(PipeError::Source(SourceError::WatchInit(
                            "realtime stream closed".into(),
                        )));
                    };
                    if let Some(event) = self.to_event(observed) {
                        if let Some(batch) = batcher.push(event) {
                            self.send_batch(MessageSource::Realtime, batch, false).await?;
                        }
                    }
                }

                _ = flush_tick.tick() => {
                    if !batcher.is_empty() {
                        self.send_batch(MessageSource::Realtime, batcher.take(), false).await?;
                    }
                }

                _ = hb_tick.tick() => {
                    self.heartbeat_cycle().await?;
                }

                _ = audit_tick.tick() => {
                    if self.role().is_leader() {
                        self.spawn_audit();
                    }
                }

                _ = sentinel_tick.tick() => {
                    if self.role().is_leader() {
                        if let Err(e) = self.sentinel_cycle().await {
                            if matches!(e, PipeError::Cancelled | PipeError::Exhausted { .. }) {
                                return Err(e);
                            }
                            debug!(pipe = %self.config.name, "sentinel cycle skipped: {e}");
                        }
                    }
                }
            }
        }

        // Finish the in-flight batch, then let the server know we're gone.
        self.set(PipeState::DRAINING, true);
        if !batcher.is_empty() {
            if let Err(e) = self.send_once(MessageSource::Realtime, batcher.take(), false).await {
                warn!(pipe = %self.config.name, "drain flush failed: {e}");
            }
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.replace_state(PipeState::STOPPING);
        if let Err(e) = self.client.close_session(&self.session()).await {
            debug!(pipe = %self.config.name, "close_session failed: {e}");
        }
        self.replace_state(PipeState::STOPPED);
        info!(pipe = %self.config.name, "pipe stopped");
    }

    /// Convert one watch observation into an indexed event, applying the
    /// pipe's field projection.
    fn to_event(&self, observed: WatchEvent) -> Option<Event> {
        let WatchEvent { kind, row } = observed;
        let row = self.project(row)?;
        let index = self.shared.next_index.fetch_add(1, Ordering::Relaxed);
        Some(row.into_event(
            kind,
            MessageSource::Realtime,
            index,
            self.session(),
            self.agent_id.clone(),
        ))
    }

    fn project(&self, row: FsRow) -> Option<FsRow> {
        if self.config.fields_mapping.is_passthrough() {
            return Some(row);
        }
        let serde_json::Value::Object(map) = serde_json::to_value(&row).ok()? else {
            return None;
        };
        let projected = self.config.fields_mapping.project(map);
        match serde_json::from_value(serde_json::Value::Object(projected)) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(
                    pipe = %self.config.name,
                    path = %row.path,
                    "fields_mapping drops required fields, row skipped: {e}"
                );
                None
            }
        }
    }

    /// Send one batch, absorbing transport trouble with backoff and session
    /// loss with re-creation. The batch is retried as-is; there is no
    /// partial acceptance.
    async fn send_batch(
        self: &Arc<Self>,
        source: MessageSource,
        mut events: Vec<Event>,
        snapshot_end: bool,
    ) -> Result<IngestAck, PipeError> {
        let mut backoff = Backoff::default();
        loop {
            match self.send_once(source, events.clone(), snapshot_end).await {
                Ok(ack) => {
                    self.set(PipeState::RECONNECTING, false);
                    *self.shared.role.lock() = ack.role;
                    if ack.snapshot_needed {
                        self.spawn_snapshot();
                    }
                    return Ok(ack);
                }
                Err(e) if e.session_lost() => {
                    warn!(pipe = %self.config.name, "session lost, re-creating");
                    let grant = self.establish().await?;
                    self.adopt(&grant);
                    // Anything at or below the committed offset was already
                    // applied under the previous session.
                    events.retain(|ev| ev.index > grant.committed_index);
                    if events.is_empty() && !snapshot_end {
                        return Ok(IngestAck {
                            committed_index: grant.committed_index,
                            accepted: 0,
                            dropped: 0,
                            role: grant.role,
                            snapshot_needed: false,
                        });
                    }
                }
                Err(e) if e.not_leader() => {
                    *self.shared.role.lock() = Role::Follower;
                    return Err(PipeError::Demoted);
                }
                Err(e) if e.retryable() => {
                    self.set(PipeState::RECONNECTING, true);
                    self.sleep_backoff(&mut backoff, &e).await?;
                }
                Err(e) => {
                    error!(pipe = %self.config.name, "batch rejected: {e}");
                    return Err(PipeError::Exhausted { attempts: backoff.attempt() });
                }
            }
        }
    }

    async fn send_once(
        &self,
        source: MessageSource,
        mut events: Vec<Event>,
        snapshot_end: bool,
    ) -> Result<IngestAck, ClientError> {
        let session = self.session();
        for event in &mut events {
            event.session_id = session.clone();
        }
        self.client.ingest(&session, source, events, snapshot_end).await
    }

    async fn heartbeat_cycle(self: &Arc<Self>) -> Result<(), PipeError> {
        match self.client.heartbeat(&self.session()).await {
            Ok(info) => {
                let was = self.role();
                *self.shared.role.lock() = info.role;
                if was != info.role {
                    info!(pipe = %self.config.name, role = %info.role, "role changed");
                }
                for command in info.pending_commands {
                    match command {
                        PendingCommand::StartSnapshot => self.spawn_snapshot(),
                        PendingCommand::StartAudit => {
                            if self.role().is_leader() {
                                self.spawn_audit();
                            }
                        }
                        PendingCommand::Stop => {
                            info!(pipe = %self.config.name, "server requested stop");
                            self.cancel.cancel();
                        }
                    }
                }
                Ok(())
            }
            Err(e) if e.session_lost() => {
                let grant = self.establish().await?;
                self.adopt(&grant);
                Ok(())
            }
            Err(e) if e.retryable() => {
                // The next tick retries; sustained failure surfaces on the
                // ingest path where backoff applies.
                debug!(pipe = %self.config.name, "heartbeat failed: {e}");
                Ok(())
            }
            Err(e) => {
                error!(pipe = %self.config.name, "heartbeat rejected: {e}");
                Err(PipeError::Exhausted { attempts: 0 })
            }
        }
    }

    /// Snapshot overlay: full scan streamed alongside realtime.
    fn spawn_snapshot(self: &Arc<Self>) {
        {
            let mut running = self.shared.snapshot_running.lock();
            if *running {
                return;
            }
            *running = true;
        }
        let pipe = Arc::clone(self);
        tokio::spawn(async move {
            pipe.set(PipeState::SNAPSHOT, true);
            info!(pipe = %pipe.config.name, "snapshot starting");
            let result = pipe.stream_scan(MessageSource::Snapshot).await;
            pipe.set(PipeState::SNAPSHOT, false);
            *pipe.shared.snapshot_running.lock() = false;
            match result {
                Ok(count) => info!(pipe = %pipe.config.name, rows = count, "snapshot complete"),
                Err(PipeError::Demoted) => {
                    warn!(pipe = %pipe.config.name, "snapshot aborted: demoted")
                }
                Err(e) => warn!(pipe = %pipe.config.name, "snapshot failed: {e}"),
            }
        });
    }

    /// Audit overlay: audit-start, scan rows with parent mtimes, audit-end.
    fn spawn_audit(self: &Arc<Self>) {
        if self.state().contains(PipeState::AUDIT) {
            return;
        }
        let pipe = Arc::clone(self);
        tokio::spawn(async move {
            pipe.set(PipeState::AUDIT, true);
            info!(pipe = %pipe.config.name, "audit cycle starting");
            let result = pipe.run_audit().await;
            pipe.set(PipeState::AUDIT, false);
            match result {
                Ok(count) => info!(pipe = %pipe.config.name, rows = count, "audit cycle complete"),
                Err(PipeError::Demoted) => {
                    warn!(pipe = %pipe.config.name, "audit aborted: demoted")
                }
                Err(e) => warn!(pipe = %pipe.config.name, "audit failed: {e}"),
            }
        });
    }

    async fn run_audit(self: &Arc<Self>) -> Result<usize, PipeError> {
        self.client.audit_start(&self.session()).await.map_err(map_control_error)?;
        let count = self.stream_scan(MessageSource::Audit).await?;
        self.client.audit_end(&self.session()).await.map_err(map_control_error)?;
        Ok(count)
    }

    /// Stream a full scan in batches. The final snapshot batch carries the
    /// end-of-snapshot marker (possibly as an empty batch).
    async fn stream_scan(self: &Arc<Self>, source: MessageSource) -> Result<usize, PipeError> {
        let rows = match source {
            MessageSource::Snapshot => self.source.snapshot_scan()?,
            _ => self.source.audit_scan()?,
        };
        let batch_size = self.config.consistency.batch_size;
        let mut sent = 0usize;
        let mut rows = rows.peekable();
        let mut pending: Vec<Event> = Vec::with_capacity(batch_size);
        loop {
            if self.cancel.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            while pending.len() < batch_size {
                let Some(row) = rows.next() else { break };
                let kind = EventKind::Insert;
                let Some(row) = self.project(row) else { continue };
                let index = self.shared.next_index.fetch_add(1, Ordering::Relaxed);
                pending.push(row.into_event(
                    kind,
                    source,
                    index,
                    self.session(),
                    self.agent_id.clone(),
                ));
            }
            let is_last = rows.peek().is_none();
            let snapshot_end = is_last && source == MessageSource::Snapshot;
            if pending.is_empty() && !snapshot_end {
                break;
            }
            sent += pending.len();
            self.send_batch(source, std::mem::take(&mut pending), snapshot_end).await?;
            if is_last {
                break;
            }
        }
        Ok(sent)
    }

    /// Sentinel: poll verification tasks, re-stat each path, report back.
    async fn sentinel_cycle(self: &Arc<Self>) -> Result<(), PipeError> {
        let session = self.session();
        let tasks = self.client.sentinel_tasks(&session).await.map_err(map_control_error)?;
        if tasks.is_empty() {
            return Ok(());
        }
        debug!(pipe = %self.config.name, tasks = tasks.len(), "sentinel verifying");
        let source = Arc::clone(&self.source);
        let results: Vec<SentinelResult> = tokio::task::spawn_blocking(move || {
            tasks.iter().map(|t| source.stat(&t.path)).collect()
        })
        .await
        .unwrap_or_default();
        self.client.sentinel_feedback(&session, results).await.map_err(map_control_error)?;
        Ok(())
    }
}

fn map_control_error(e: ClientError) -> PipeError {
    if e.not_leader() {
        PipeError::Demoted
    } else {
        PipeError::Exhausted { attempts: 0 }
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
