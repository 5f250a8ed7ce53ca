// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide state: the per-pipe view states, the session registry, and
//! the shared skew estimator.
//!
//! Per-pipe arbitration and tree mutation serialize behind one `RwLock`;
//! queries take the read side. The skew estimator has its own lock and a
//! lock-free read path for `now()`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fustor_core::{Clock, Consistency, PipeId, SkewEstimator, ViewId};
use fustor_wire::{DropReason, NotReadyReason, ViewStats};
use parking_lot::RwLock;

use crate::blindspot::BlindSpotSet;
use crate::config::FusionConfig;
use crate::sessions::SessionManager;
use crate::suspect::SuspectSet;
use crate::tombstone::TombstoneMap;
use crate::tree::Tree;

/// Arbitration accounting for one pipe. Outcomes are counted, never raised.
#[derive(Debug, Default)]
pub struct Counters {
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub drops_by_reason: HashMap<DropReason, u64>,
    pub suspects_marked: u64,
    pub suspects_cleared: u64,
    pub tombstones_created: u64,
    pub tombstones_purged: u64,
    pub synthetic_deletes: u64,
    pub last_apply_micros: u64,
}

impl Counters {
    pub fn record_drop(&mut self, reason: DropReason) {
        self.events_dropped += 1;
        *self.drops_by_reason.entry(reason).or_insert(0) += 1;
    }
}

/// Everything the arbitrator mutates for one pipe, behind the write lock.
#[derive(Debug, Default)]
pub struct ViewState {
    pub tree: Tree,
    /// URI stamped on every node this pipe produces, e.g. `fs://share`.
    pub source_uri: Option<String>,
    pub tombstones: TombstoneMap,
    pub suspects: SuspectSet,
    pub blind_spots: BlindSpotSet,
    /// Logical time at the current audit-start, while a cycle is active.
    pub audit_epoch: Option<f64>,
    /// Paths observed by the active audit cycle.
    pub audit_seen: HashSet<String>,
    pub snapshot_complete: bool,
    pub counters: Counters,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            nodes: self.tree.len(),
            dirs: self.tree.dir_count(),
            files: self.tree.file_count(),
            tombstones: self.tombstones.len(),
            suspects: self.suspects.len(),
            blind_spots: self.blind_spots.len(),
            events_accepted: self.counters.events_accepted,
            events_dropped: self.counters.events_dropped,
            drops_by_reason: self
                .counters
                .drops_by_reason
                .iter()
                .map(|(reason, count)| (reason.to_string(), *count))
                .collect(),
            last_apply_micros: self.counters.last_apply_micros,
            ready: false,
            not_ready_reason: None,
        }
    }
}

/// One configured pipe and its guarded view state.
pub struct PipeHandle {
    pub id: PipeId,
    pub view: ViewId,
    pub schema: String,
    pub consistency: Consistency,
    pub enabled: AtomicBool,
    pub state: RwLock<ViewState>,
    /// Ingest batches admitted but not yet applied.
    pub ingest_pending: AtomicUsize,
}

impl PipeHandle {
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// The readiness gate: ready ⇔ snapshot complete ∧ queue drained ∧
    /// a live leader session. Checked on every view query.
    pub fn readiness(&self, leader_alive: bool) -> Result<(), NotReadyReason> {
        if !self.state.read().snapshot_complete {
            return Err(NotReadyReason::SnapshotIncomplete);
        }
        if self.ingest_pending.load(Ordering::Acquire) > 0 {
            return Err(NotReadyReason::QueueDraining);
        }
        if !leader_alive {
            return Err(NotReadyReason::NoLeader);
        }
        Ok(())
    }
}

/// Root of all fusion-side state.
pub struct FusionState<C: Clock> {
    pub clock: C,
    pub skew: SkewEstimator,
    pub sessions: SessionManager<C>,
    pub start_time: Instant,
    pipes: HashMap<PipeId, Arc<PipeHandle>>,
    by_key: HashMap<String, PipeId>,
    by_view: HashMap<ViewId, PipeId>,
}

impl<C: Clock> FusionState<C> {
    pub fn from_config(config: &FusionConfig, clock: C) -> Self {
        let mut pipes = HashMap::new();
        let mut by_key = HashMap::new();
        let mut by_view = HashMap::new();
        let mut tuning = HashMap::new();

        for pipe in &config.pipes {
            tuning.insert(pipe.id.clone(), pipe.consistency.clone());
            by_key.insert(pipe.api_key.clone(), pipe.id.clone());
            by_view.insert(pipe.view.clone(), pipe.id.clone());
            pipes.insert(
                pipe.id.clone(),
                Arc::new(PipeHandle {
                    id: pipe.id.clone(),
                    view: pipe.view.clone(),
                    schema: pipe.schema.clone(),
                    consistency: pipe.consistency.clone(),
                    enabled: AtomicBool::new(pipe.enabled),
                    state: RwLock::new(ViewState {
                        source_uri: Some(format!("{}://{}", pipe.schema, pipe.id)),
                        ..ViewState::new()
                    }),
                    ingest_pending: AtomicUsize::new(0),
                }),
            );
        }

        let start_time = clock.now();
        Self {
            sessions: SessionManager::new(clock.clone(), tuning),
            skew: SkewEstimator::new(config.trust_window_secs),
            clock,
            start_time,
            pipes,
            by_key,
            by_view,
        }
    }

    pub fn pipe(&self, id: &PipeId) -> Option<Arc<PipeHandle>> {
        self.pipes.get(id).cloned()
    }

    pub fn pipe_by_key(&self, api_key: &str) -> Option<Arc<PipeHandle>> {
        self.by_key.get(api_key).and_then(|id| self.pipes.get(id)).cloned()
    }

    pub fn pipe_by_view(&self, view: &ViewId) -> Option<Arc<PipeHandle>> {
        self.by_view.get(view).and_then(|id| self.pipes.get(id)).cloned()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    pub fn view_count(&self) -> usize {
        self.by_view.len()
    }

    /// Apply per-pipe enable flags from a reloaded config. Structural
    /// changes (new pipes, key changes) require a restart and are ignored.
    pub fn apply_enabled_flags(&self, config: &FusionConfig) {
        for pipe in &config.pipes {
            if let Some(handle) = self.pipes.get(&pipe.id) {
                handle.enabled.store(pipe.enabled, Ordering::Relaxed);
            }
        }
    }

    /// Periodic housekeeping: expire idle sessions (releasing their skew
    /// samples) and age out suspects and tombstones.
    pub fn sweep(&self) {
        for record in self.sessions.expire_idle() {
            self.skew.forget_session(&record.id);
        }
        let wall = self.clock.epoch_secs();
        for handle in self.pipes.values() {
            let mut state = handle.state.write();
            let now = self.skew.now(wall);
            for path in state.suspects.purge_expired(now) {
                if let Some(node) = state.tree.lookup_mut(&path) {
                    node.integrity_suspect = false;
                    node.suspect_until = None;
                }
                state.counters.suspects_cleared += 1;
            }
            let purged = {
                let blind = state.blind_spots.paths().clone();
                state.tombstones.purge_expired(now, &blind)
            };
            state.counters.tombstones_purged += purged as u64;
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
