// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for Fustor daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod request;
mod response;
mod types;
mod wire;

pub use request::Request;
pub use response::Response;
pub use types::{
    AgentStatusReport, DropReason, Dropped, ErrorKind, NodeView, NotReadyReason, PendingCommand,
    Role, SentinelResult, SentinelTask, SessionSummary, ViewStats,
};
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response, ProtocolError, MAX_FRAME_LEN,
};
