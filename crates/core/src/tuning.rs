// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consistency tuning knobs shared by both daemons.
//!
//! Every field has a serde default so a config file only names what it
//! overrides.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable windows and intervals of the consistency core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consistency {
    /// Agent heartbeat interval.
    pub heartbeat_secs: f64,
    /// Leadership TTL as a multiple of the heartbeat interval.
    pub leader_timeout_factor: f64,
    /// Sessions with no heartbeat for this long are expired outright.
    pub session_ttl_secs: f64,
    /// Events with an mtime within this window of logical now are suspects.
    pub hot_window_secs: f64,
    /// Suspect entries expire after this long without confirmation.
    pub suspect_ttl_secs: f64,
    /// Tombstones are purged after this long (if unreferenced by a blind spot).
    pub tombstone_ttl_secs: f64,
    /// Half-width of the trust interval around the skew-corrected baseline.
    pub trust_window_secs: f64,
    /// Leader polls for sentinel tasks at this cadence.
    pub sentinel_interval_secs: f64,
    /// Sentinel mtime comparisons use this epsilon.
    pub mtime_epsilon_secs: f64,
    /// Audit cadence on the leader.
    pub audit_interval_secs: f64,
    /// Max events per ingest batch.
    pub batch_size: usize,
    /// Max time a partial batch may wait before flushing.
    pub batch_interval_ms: u64,
    /// In-flight ingest batches per pipe before the server answers `busy`.
    pub ingest_queue_cap: usize,
    /// Per-request deadline on the wire.
    pub request_timeout_secs: f64,
}

impl Default for Consistency {
    fn default() -> Self {
        Self {
            heartbeat_secs: 10.0,
            leader_timeout_factor: 3.0,
            session_ttl_secs: 60.0,
            hot_window_secs: 60.0,
            suspect_ttl_secs: 30.0,
            tombstone_ttl_secs: 600.0,
            trust_window_secs: 1.0,
            sentinel_interval_secs: 120.0,
            mtime_epsilon_secs: 0.001,
            audit_interval_secs: 3600.0,
            batch_size: 1000,
            batch_interval_ms: 200,
            ingest_queue_cap: 64,
            request_timeout_secs: 30.0,
        }
    }
}

impl Consistency {
    /// Leadership TTL in seconds (`heartbeat × factor`).
    pub fn leader_timeout_secs(&self) -> f64 {
        self.heartbeat_secs * self.leader_timeout_factor
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    pub fn sentinel_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sentinel_interval_secs)
    }

    pub fn audit_interval(&self) -> Duration {
        Duration::from_secs_f64(self.audit_interval_secs)
    }
}

#[cfg(test)]
#[path = "tuning_tests.rs"]
mod tests;
