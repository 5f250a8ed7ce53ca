// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport to the Fusion server.
//!
//! The [`Transport`] trait is one async call: request in, response out.
//! [`TcpTransport`] is the real thing (connect per request, per-request
//! deadline); tests drive the pipe with an in-memory fake. [`Client`]
//! layers typed methods on top and splits failures into `transport`
//! (retry with backoff) and `protocol` (re-create the session).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fustor_core::{AgentId, Event, MessageSource, SessionId};
use fustor_wire::{
    self as wire, ErrorKind, PendingCommand, Request, Response, Role, SentinelResult,
    SentinelTask,
};
use thiserror::Error;
use tokio::net::TcpStream;

/// Transport-level failures: connection refused, timeouts, framing.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] wire::ProtocolError),
}

/// One request/response exchange with the server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, request: Request) -> Result<Response, TransportError>;
}

/// Connect-per-request TCP transport with a deadline.
pub struct TcpTransport {
    addr: String,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self { addr: addr.into(), timeout }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn call(&self, request: Request) -> Result<Response, TransportError> {
        let connect = TcpStream::connect(&self.addr);
        let stream = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|source| TransportError::Connect { addr: self.addr.clone(), source })?;
        let (mut reader, mut writer) = stream.into_split();
        wire::write_request(&mut writer, &request).await?;
        let response = wire::read_response(&mut reader, self.timeout).await?;
        Ok(response)
    }
}

/// Failures surfaced to the pipe, split by recovery strategy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Retry locally with backoff.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Typed server-side rejection.
    #[error("server rejected: {kind}: {message}")]
    Server { kind: ErrorKind, message: String },

    /// The server answered with a variant this call does not expect.
    #[error("unexpected response variant")]
    Unexpected,
}

impl ClientError {
    /// Session gone: re-create it and resume from the committed offset.
    pub fn session_lost(&self) -> bool {
        matches!(self, ClientError::Server { kind: ErrorKind::SessionUnknown, .. })
    }

    /// Role changed under us: stop leader-only work, keep realtime.
    pub fn not_leader(&self) -> bool {
        matches!(self, ClientError::Server { kind: ErrorKind::NotLeader, .. })
    }

    /// Server sheds load: back off and retry as-is.
    pub fn busy(&self) -> bool {
        matches!(self, ClientError::Server { kind: ErrorKind::Busy, .. })
    }

    pub fn retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_)) || self.busy()
    }
}

/// Session grant returned by `create_session`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub session_id: SessionId,
    pub role: Role,
    pub leader_deadline_secs: f64,
    pub committed_index: u64,
}

/// Heartbeat acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatInfo {
    pub role: Role,
    pub leader_deadline_secs: f64,
    pub pending_commands: Vec<PendingCommand>,
}

/// Batch acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestAck {
    pub committed_index: u64,
    pub accepted: usize,
    pub dropped: usize,
    pub role: Role,
    pub snapshot_needed: bool,
}

/// Typed client over any [`Transport`].
pub struct Client<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self { transport: Arc::clone(&self.transport) }
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport: Arc::new(transport) }
    }

    async fn call(&self, request: Request) -> Result<Response, ClientError> {
        match self.transport.call(request).await? {
            Response::Error { kind, message } => Err(ClientError::Server { kind, message }),
            response => Ok(response),
        }
    }

    pub async fn create_session(
        &self,
        api_key: &str,
        agent_id: &AgentId,
        task_id: &str,
    ) -> Result<SessionGrant, ClientError> {
        match self
            .call(Request::CreateSession {
                api_key: api_key.to_string(),
                agent_id: agent_id.clone(),
                task_id: task_id.to_string(),
            })
            .await?
        {
            Response::SessionCreated { session_id, role, leader_deadline_secs, committed_index } => {
                Ok(SessionGrant { session_id, role, leader_deadline_secs, committed_index })
            }
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn heartbeat(&self, session_id: &SessionId) -> Result<HeartbeatInfo, ClientError> {
        match self.call(Request::Heartbeat { session_id: session_id.clone(), status: None }).await? {
            Response::HeartbeatAck { role, leader_deadline_secs, pending_commands } => {
                Ok(HeartbeatInfo { role, leader_deadline_secs, pending_commands })
            }
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn close_session(&self, session_id: &SessionId) -> Result<(), ClientError> {
        match self.call(Request::CloseSession { session_id: session_id.clone() }).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn ingest(
        &self,
        session_id: &SessionId,
        source: MessageSource,
        events: Vec<Event>,
        snapshot_end: bool,
    ) -> Result<IngestAck, ClientError> {
        match self
            .call(Request::Ingest { session_id: session_id.clone(), source, events, snapshot_end })
            .await?
        {
            Response::Ingested { committed_index, accepted, dropped, role, snapshot_needed } => {
                Ok(IngestAck {
                    committed_index,
                    accepted,
                    dropped: dropped.len(),
                    role,
                    snapshot_needed,
                })
            }
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn audit_start(&self, session_id: &SessionId) -> Result<(), ClientError> {
        match self.call(Request::AuditStart { session_id: session_id.clone() }).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn audit_end(&self, session_id: &SessionId) -> Result<(), ClientError> {
        match self.call(Request::AuditEnd { session_id: session_id.clone() }).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn sentinel_tasks(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<SentinelTask>, ClientError> {
        match self.call(Request::SentinelTasks { session_id: session_id.clone() }).await? {
            Response::SentinelTaskList { tasks } => Ok(tasks),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn sentinel_feedback(
        &self,
        session_id: &SessionId,
        results: Vec<SentinelResult>,
    ) -> Result<(), ClientError> {
        match self
            .call(Request::SentinelFeedback { session_id: session_id.clone(), results })
            .await?
        {
            Response::Ok => Ok(()),
            _ => Err(ClientError::Unexpected),
        }
    }
}
