// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the fusion daemon.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the base directory: FUSTOR_HOME > ~/.config/fustor
pub fn fustor_home() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FUSTOR_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoHomeDir)?;
    Ok(home.join(".config/fustor"))
}

/// Per-request deadline on the wire (default 30s, `FUSTOR_IPC_TIMEOUT_MS`).
pub fn ipc_timeout() -> Duration {
    std::env::var("FUSTOR_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Listen address override (`FUSTOR_LISTEN`).
pub fn listen_override() -> Option<String> {
    std::env::var("FUSTOR_LISTEN").ok().filter(|s| !s.is_empty())
}

/// Housekeeping sweep interval (default 1s, `FUSTOR_SWEEP_MS`).
///
/// Drives session expiry, suspect TTLs, and tombstone purges.
pub fn sweep_interval() -> Duration {
    std::env::var("FUSTOR_SWEEP_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(1))
}
