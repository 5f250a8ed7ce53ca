// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup sequence: lock, bind, spawn, then serve until a signal.

use std::fs::File;
use std::sync::Arc;

use fs2::FileExt;
use fustor_core::SystemClock;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use super::{LifecycleError, Paths};
use crate::config::FusionConfig;
use crate::env;
use crate::listener::{ListenCtx, Listener};
use crate::state::FusionState;

/// Live daemon handles after startup.
pub struct StartupResult {
    pub state: Arc<FusionState<SystemClock>>,
    pub listener: Listener<SystemClock>,
    pub shutdown: Arc<Notify>,
    pub paths: Paths,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Load config, take the daemon lock, and bind the listener.
pub async fn startup(paths: Paths) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&paths.home)?;

    let lock_file = File::create(&paths.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::AlreadyRunning(paths.lock_path.clone()));
    }

    let mut config = FusionConfig::load(&paths.config_path)?;
    if let Some(listen) = env::listen_override() {
        config.listen = listen;
    }

    let state = Arc::new(FusionState::from_config(&config, SystemClock));
    let shutdown = Arc::new(Notify::new());
    let tcp = TcpListener::bind(&config.listen).await?;
    info!(listen = %config.listen, pipes = state.pipe_count(), "fusiond listening");

    let ctx = Arc::new(ListenCtx { state: Arc::clone(&state), shutdown: Arc::clone(&shutdown) });
    let listener = Listener::new(tcp, ctx);
    Ok(StartupResult { state, listener, shutdown, paths, lock_file })
}

/// Run the daemon until SIGTERM/SIGINT (or a Shutdown request).
///
/// SIGHUP re-reads the config; an invalid file is rejected and the running
/// config continues. Only per-pipe enable flags apply live; structural
/// changes need a restart.
pub async fn run(startup: StartupResult) -> Result<(), LifecycleError> {
    let StartupResult { state, listener, shutdown, paths, lock_file: _lock_file } = startup;

    let listener_task = tokio::spawn(listener.run());

    let sweep_state = Arc::clone(&state);
    let sweep_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(env::sweep_interval());
        loop {
            tick.tick().await;
            sweep_state.sweep();
        }
    });

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, stopping");
                break;
            }
            _ = sighup.recv() => {
                match FusionConfig::load(&paths.config_path) {
                    Ok(config) => {
                        state.apply_enabled_flags(&config);
                        info!("config reloaded; pipe enable flags applied");
                    }
                    Err(e) => {
                        error!("config reload rejected, keeping running config: {e}");
                    }
                }
            }
            _ = shutdown.notified() => {
                info!("shutdown requested, stopping");
                break;
            }
        }
    }

    shutdown.notify_waiters();
    sweep_task.abort();
    if let Err(e) = listener_task.await {
        if !e.is_cancelled() {
            warn!("listener task ended abnormally: {e}");
        }
    }
    info!("fusiond stopped");
    Ok(())
}
