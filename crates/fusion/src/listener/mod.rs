// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! them without blocking arbitration. Each connection carries one request
//! and one response; senders reconnect per call.

mod handlers;

use std::sync::Arc;

use fustor_core::Clock;
use fustor_wire as wire;
use fustor_wire::ProtocolError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::env::ipc_timeout;
use crate::state::FusionState;

/// Shared daemon context for all request handlers.
pub struct ListenCtx<C: Clock> {
    pub state: Arc<FusionState<C>>,
    pub shutdown: Arc<Notify>,
}

impl<C: Clock> ListenCtx<C> {
    /// Dispatch one request against the daemon state. The socket layer is
    /// a thin framing wrapper around this.
    pub fn handle(&self, request: wire::Request) -> wire::Response {
        handlers::dispatch(request, self)
    }
}

/// Listener task for accepting socket connections.
pub struct Listener<C: Clock> {
    tcp: TcpListener,
    ctx: Arc<ListenCtx<C>>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl<C: Clock + 'static> Listener<C> {
    pub fn new(tcp: TcpListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { tcp, ctx }
    }

    /// Run the accept loop until shutdown, spawning a task per connection.
    pub async fn run(self) {
        loop {
            tokio::select! {
                result = self.tcp.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("connection from {}", addr);
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(async move {
                                let (reader, writer) = stream.into_split();
                                if let Err(e) = handle_connection(reader, writer, &ctx).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
                _ = self.ctx.shutdown.notified() => {
                    debug!("listener stopping");
                    break;
                }
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("client disconnected")
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("connection timeout"),
        _ => error!("connection error: {}", e),
    }
}

/// Handle a single client connection: one request, one response.
///
/// Generic over reader/writer so tests can drive it with in-memory duplex
/// streams.
pub(crate) async fn handle_connection<C, R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx<C>,
) -> Result<(), ConnectionError>
where
    C: Clock,
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request = wire::read_request(&mut reader, ipc_timeout()).await?;
    let response = handlers::dispatch(request, ctx);
    wire::write_response(&mut writer, &response).await?;
    Ok(())
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
