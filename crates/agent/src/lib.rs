// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fustor-agent: the data-plane daemon — filesystem source driver, pipe
//! state machine, batching, and the sender transport.

pub mod backoff;
pub mod batch;
pub mod config;
pub mod fs;
pub mod lifecycle;
pub mod pipe;
pub mod sender;
pub mod source;
pub mod watch;

pub use config::{AgentConfig, AgentPipeConfig, ConfigError};
pub use fs::FsSource;
pub use lifecycle::AgentError;
pub use pipe::{Pipe, PipeError, PipeState};
pub use sender::{Client, ClientError, TcpTransport, Transport, TransportError};
pub use source::{Source, SourceError, WatchEvent, WatchHandle};
