// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent supervisor: spawn one pipe per configured subtree, watch for
//! signals, restart pipes against a freshly loaded config on SIGHUP.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{AgentConfig, ConfigError};
use crate::fs::FsSource;
use crate::pipe::{Pipe, PipeError};
use crate::sender::{Client, TcpTransport};

/// Agent-fatal errors, mapped to exit codes like the daemon's: config 1,
/// I/O 2.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Config(_) => 1,
            AgentError::Io(_) => 2,
        }
    }
}

type FsPipe = Pipe<FsSource, TcpTransport>;

enum Outcome {
    Stop,
    Reload,
}

/// Run all configured pipes until SIGTERM/SIGINT. SIGHUP reloads the
/// config: running pipes finish their in-flight batch (CONF_OUTDATED
/// overlay), then re-initialize against the new config. An invalid reload
/// is rejected and the running config continues.
pub async fn run(config_path: &Path) -> Result<(), AgentError> {
    let mut config = AgentConfig::load(config_path)?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;

    loop {
        let pipes = spawn_pipes(&config);
        info!(pipes = pipes.len(), agent = %config.agent_id, "agent running");

        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => Outcome::Stop,
            _ = sigterm.recv() => Outcome::Stop,
            _ = sighup.recv() => Outcome::Reload,
        };

        match outcome {
            Outcome::Stop => {
                info!("stopping agent");
                stop_all(pipes, false).await;
                return Ok(());
            }
            Outcome::Reload => match AgentConfig::load(config_path) {
                Ok(fresh) => {
                    info!("config reloaded, re-initializing pipes");
                    stop_all(pipes, true).await;
                    config = fresh;
                }
                Err(e) => {
                    error!("config reload rejected, keeping running config: {e}");
                }
            },
        }
    }
}

fn spawn_pipes(config: &AgentConfig) -> Vec<(Arc<FsPipe>, JoinHandle<Result<(), PipeError>>)> {
    config
        .pipes
        .iter()
        .map(|pipe_config| {
            let source = FsSource::new(&pipe_config.root, pipe_config.watch_limit);
            let transport =
                TcpTransport::new(&config.server, pipe_config.consistency.request_timeout());
            let pipe = Pipe::new(
                pipe_config.clone(),
                config.agent_id.clone(),
                source,
                Client::new(transport),
            );
            let runner = Arc::clone(&pipe);
            let task = tokio::spawn(async move { runner.run().await });
            (pipe, task)
        })
        .collect()
}

async fn stop_all(
    pipes: Vec<(Arc<FsPipe>, JoinHandle<Result<(), PipeError>>)>,
    conf_outdated: bool,
) {
    for (pipe, _) in &pipes {
        if conf_outdated {
            pipe.mark_conf_outdated();
        } else {
            pipe.stop();
        }
    }
    for (_, task) in pipes {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("pipe ended with error: {e}"),
            Err(e) => warn!("pipe task panicked: {e}"),
        }
    }
}
