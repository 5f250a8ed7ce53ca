// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin query client over the wire protocol.

use std::time::Duration;

use fustor_agent::{ClientError, TcpTransport, Transport};
use fustor_wire::{Request, Response};

use crate::exit_error::ExitError;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Send one request, surfacing server errors and 503s as exit errors.
pub async fn call(server: &str, request: Request) -> Result<Response, ExitError> {
    let transport = TcpTransport::new(server, QUERY_TIMEOUT);
    let response = transport
        .call(request)
        .await
        .map_err(|e| ExitError::from(ClientError::from(e)))?;
    match response {
        Response::Error { kind, message } => {
            Err(ExitError::new(2, format!("server rejected: {kind}: {message}")))
        }
        Response::Unavailable { reason } => {
            Err(ExitError::new(2, format!("view not ready: {reason}")))
        }
        response => Ok(response),
    }
}
