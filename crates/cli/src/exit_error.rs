// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error-to-exit-code mapping: 0 clean, 1 config, 2 unrecoverable I/O.

use fustor_agent::{AgentError, ClientError};
use fustor_fusion::lifecycle::LifecycleError;

#[derive(Debug)]
pub struct ExitError {
    pub code: u8,
    pub message: String,
}

impl ExitError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<LifecycleError> for ExitError {
    fn from(e: LifecycleError) -> Self {
        Self::new(e.exit_code() as u8, e.to_string())
    }
}

impl From<AgentError> for ExitError {
    fn from(e: AgentError) -> Self {
        Self::new(e.exit_code() as u8, e.to_string())
    }
}

impl From<ClientError> for ExitError {
    fn from(e: ClientError) -> Self {
        Self::new(2, e.to_string())
    }
}

impl From<serde_json::Error> for ExitError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(2, e.to_string())
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
