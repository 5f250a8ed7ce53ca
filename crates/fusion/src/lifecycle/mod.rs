// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, config reload.

mod startup;
pub use startup::{run, startup, StartupResult};

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::env::fustor_home;

/// Daemon lifecycle errors, mapped to process exit codes: config problems
/// exit 1, unrecoverable I/O exits 2.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No home directory found")]
    NoHomeDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Another fusiond already holds {0}")]
    AlreadyRunning(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::NoHomeDir | LifecycleError::Config(_) => 1,
            LifecycleError::AlreadyRunning(_) | LifecycleError::Io(_) => 2,
        }
    }
}

/// Filesystem layout for the daemon.
#[derive(Debug, Clone)]
pub struct Paths {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    /// Resolve paths under `$FUSTOR_HOME` (default `~/.config/fustor`).
    pub fn resolve() -> Result<Self, LifecycleError> {
        let home = fustor_home()?;
        Ok(Self {
            config_path: home.join("fusion.toml"),
            lock_path: home.join("fusiond.pid"),
            log_path: home.join("fusiond.log"),
            home,
        })
    }
}
