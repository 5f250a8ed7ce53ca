// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event arbitration.
//!
//! Every incoming event runs the same gauntlet: tombstone check, mtime
//! arbitration by stream precedence, blind-spot tracking, hot-window
//! suspect marking. Realtime deletes produce tombstones; non-realtime
//! deletes are never applied (absence is only ever concluded at audit-end).
//! All rejections are accounted as drop reasons, never as errors.

use fustor_core::{Consistency, Event, EventKind, MessageSource, SkewEstimator};
use fustor_wire::{DropReason, Dropped, SentinelResult};
use tracing::{debug, trace};

use crate::state::ViewState;
use crate::suspect::Verdict;
use crate::tree::NodeAttrs;

/// Outcome of applying one batch.
#[derive(Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub dropped: Vec<Dropped>,
    /// Highest event index seen, for offset commit.
    pub max_index: u64,
}

/// Result of closing an audit cycle.
#[derive(Debug, Default, PartialEq)]
pub struct AuditSummary {
    pub marked_missing: usize,
    pub tombstones_cleared: usize,
    pub blind_spots: usize,
}

/// Apply a batch in order. Events at or below `committed` are acknowledged
/// without mutation; everything else runs full arbitration.
pub fn apply_batch(
    view: &mut ViewState,
    skew: &SkewEstimator,
    cons: &Consistency,
    schema: &str,
    wall: f64,
    events: &[Event],
    committed: u64,
) -> BatchOutcome {
    let started = std::time::Instant::now();
    let mut outcome = BatchOutcome::default();
    for event in events {
        outcome.max_index = outcome.max_index.max(event.index);
        let verdict = if event.index > 0 && event.index <= committed {
            Err(DropReason::DuplicateIndex)
        } else if event.schema != schema {
            Err(DropReason::SchemaMismatch)
        } else {
            apply_event(view, skew, cons, wall, event)
        };
        match verdict {
            Ok(()) => {
                outcome.accepted += 1;
                view.counters.events_accepted += 1;
            }
            Err(reason) => {
                trace!(path = %event.path, %reason, "event dropped");
                view.counters.record_drop(reason);
                outcome.dropped.push(Dropped { index: event.index, reason });
            }
        }
    }
    view.counters.last_apply_micros = started.elapsed().as_micros() as u64;
    outcome
}

/// Run one event through the §precedence gauntlet.
pub fn apply_event(
    view: &mut ViewState,
    skew: &SkewEstimator,
    cons: &Consistency,
    wall: f64,
    event: &Event,
) -> Result<(), DropReason> {
    if event.kind == EventKind::Delete {
        return apply_delete(view, skew, cons, wall, event);
    }

    // Any event at a path during an active cycle counts as an observation,
    // even one that loses arbitration: a stale row still proves the path
    // exists at the source.
    if view.audit_epoch.is_some() {
        view.audit_seen.insert(event.path.clone());
    }

    // Tombstone gate. Realtime always passes and lifts the tombstone so a
    // node and a live tombstone never coexist; scan rows are blocked until
    // the tombstone is lifted by realtime, audit non-observation, or TTL.
    if view.tombstones.blocks(&event.path, event.source) {
        return Err(DropReason::Tombstoned);
    }
    if event.source == MessageSource::Realtime && view.tombstones.remove(&event.path).is_some() {
        debug!(path = %event.path, "realtime event lifted tombstone");
    }

    // MTime arbitration against the stored node. The original mtime decides
    // precedence; the watermark decides what gets stored.
    let existing_mtime = view.tree.lookup(&event.path).map(|n| n.mtime);
    match event.source {
        MessageSource::Realtime => {}
        MessageSource::Audit => {
            if let Some(current) = existing_mtime {
                if event.mtime <= current {
                    return Err(DropReason::StaleMtime);
                }
            }
            // Parent-mtime monotonicity: an audit row scanned from a
            // directory the tree already knows to be newer is a stale walk.
            if let (Some(row_parent_mtime), Some(parent)) = (
                event.parent_mtime,
                fustor_core::path::parent(&event.path).and_then(|p| view.tree.lookup(p)),
            ) {
                if parent.mtime > row_parent_mtime + cons.trust_window_secs {
                    return Err(DropReason::StaleAudit);
                }
            }
        }
        MessageSource::Snapshot => {
            if existing_mtime.is_some() {
                // The row is not applied, but it still proves the path
                // exists at the source.
                if let Some(node) = view.tree.lookup_mut(&event.path) {
                    node.agent_missing = false;
                }
                return Err(DropReason::SnapshotExisting);
            }
        }
    }

    let watermark = skew.observe(&event.session_id, event.mtime, wall);
    let now_logical = skew.now(wall);

    let source_uri = view.source_uri.clone();
    let node = view.tree.upsert(
        &event.path,
        NodeAttrs {
            is_dir: event.is_dir,
            size: event.size,
            mtime: watermark.storage_mtime,
            ctime: event.ctime,
        },
    );
    node.last_agent_id = Some(event.agent_id.clone());
    node.last_seen = now_logical;
    if event.source == MessageSource::Realtime {
        node.seen_realtime = true;
    }
    if node.source_uri.is_none() {
        node.source_uri = source_uri;
    }

    // Blind-spot tracking during an active audit cycle.
    if view.audit_epoch.is_some() && event.source == MessageSource::Audit {
        let seen_realtime = view
            .tree
            .lookup(&event.path)
            .map(|n| n.seen_realtime)
            .unwrap_or(false);
        if !seen_realtime {
            view.blind_spots.record(&event.path);
            if let Some(node) = view.tree.lookup_mut(&event.path) {
                node.blind_spot_since = Some(now_logical);
            }
        }
    }
    if event.source == MessageSource::Realtime && view.blind_spots.remove(&event.path) {
        if let Some(node) = view.tree.lookup_mut(&event.path) {
            node.blind_spot_since = None;
            node.agent_missing = false;
        }
    }

    // Hot-window suspicion: an mtime near logical now means the file may
    // still be mid-write.
    let hot = (event.mtime - now_logical).abs() < cons.hot_window_secs;
    if hot {
        view.suspects.mark(&event.path, event.mtime, now_logical, cons.suspect_ttl_secs);
        view.counters.suspects_marked += 1;
        if let Some(node) = view.tree.lookup_mut(&event.path) {
            node.integrity_suspect = true;
            node.suspect_until = Some(now_logical + cons.suspect_ttl_secs);
        }
    } else if event.source == MessageSource::Realtime && view.suspects.clear(&event.path) {
        view.counters.suspects_cleared += 1;
        if let Some(node) = view.tree.lookup_mut(&event.path) {
            node.integrity_suspect = false;
            node.suspect_until = None;
        }
    }

    Ok(())
}

fn apply_delete(
    view: &mut ViewState,
    skew: &SkewEstimator,
    cons: &Consistency,
    wall: f64,
    event: &Event,
) -> Result<(), DropReason> {
    if event.source != MessageSource::Realtime {
        // Absence on a scan stream is concluded at audit-end, never here.
        return Err(DropReason::NonRealtimeDelete);
    }
    if view.audit_epoch.is_some() {
        // A mid-cycle delete is an observation; its tombstone must outlive
        // the cycle's unobserved-path cleanup.
        view.audit_seen.insert(event.path.clone());
    }
    skew.observe(&event.session_id, event.mtime, wall);
    let now_logical = skew.now(wall);
    for removed in view.tree.remove(&event.path) {
        if view.suspects.clear(&removed) {
            view.counters.suspects_cleared += 1;
        }
        view.blind_spots.remove(&removed);
    }
    view.tombstones.insert(&event.path, event.mtime, now_logical, cons.tombstone_ttl_secs);
    view.counters.tombstones_created += 1;
    debug!(path = %event.path, mtime = event.mtime, "realtime delete tombstoned");
    Ok(())
}

/// Begin an audit epoch: clear the blind-spot set and stamp the epoch.
pub fn audit_start(view: &mut ViewState, skew: &SkewEstimator, wall: f64) {
    view.blind_spots.begin_cycle();
    view.audit_seen.clear();
    view.audit_epoch = Some(skew.now(wall));
}

/// Close the audit epoch.
///
/// Nodes the cycle did not observe are marked `agent_missing` (audit never
/// deletes); blind-spot survivors are marked too, being audit-only paths.
/// Tombstones whose paths the audit did not observe are cleared — the
/// source has confirmed there is nothing left to resurrect — and the
/// TTL purge runs for the rest.
pub fn audit_end(view: &mut ViewState, skew: &SkewEstimator, wall: f64) -> AuditSummary {
    if view.audit_epoch.take().is_none() {
        return AuditSummary::default();
    }
    let now_logical = skew.now(wall);
    let mut summary = AuditSummary { blind_spots: view.blind_spots.len(), ..Default::default() };

    for path in view.tree.paths_under(fustor_core::path::ROOT) {
        let observed = view.audit_seen.contains(&path);
        let in_blind_spot = view.blind_spots.contains(&path);
        if let Some(node) = view.tree.lookup_mut(&path) {
            if !observed || in_blind_spot {
                if !node.agent_missing {
                    summary.marked_missing += 1;
                }
                node.agent_missing = true;
            } else if node.agent_missing {
                // Observed again by a full cycle: recovered.
                node.agent_missing = false;
            }
        }
    }

    summary.tombstones_cleared = view.tombstones.retain_audit_observed(&view.audit_seen);
    let purged = view.tombstones.purge_expired(now_logical, view.blind_spots.paths());
    view.counters.tombstones_purged += (summary.tombstones_cleared + purged) as u64;
    view.audit_seen.clear();
    summary
}

/// Apply sentinel verification results.
///
/// Stable mtimes clear the suspect; moved mtimes refresh it; a vanished
/// path with no realtime delete seen becomes a synthetic realtime delete.
pub fn apply_sentinel(
    view: &mut ViewState,
    skew: &SkewEstimator,
    cons: &Consistency,
    wall: f64,
    results: &[SentinelResult],
) {
    let now_logical = skew.now(wall);
    for result in results {
        if !result.exists {
            if view.tree.lookup(&result.path).is_some() {
                for removed in view.tree.remove(&result.path) {
                    view.suspects.clear(&removed);
                    view.blind_spots.remove(&removed);
                }
                let deleted_mtime = now_logical;
                view.tombstones.insert(
                    &result.path,
                    deleted_mtime,
                    now_logical,
                    cons.tombstone_ttl_secs,
                );
                view.counters.tombstones_created += 1;
                view.counters.synthetic_deletes += 1;
                debug!(path = %result.path, "sentinel confirmed deletion");
            } else {
                view.suspects.clear(&result.path);
            }
            continue;
        }
        let Some(observed_mtime) = result.mtime else {
            continue;
        };
        match view.suspects.confirm(
            &result.path,
            observed_mtime,
            cons.mtime_epsilon_secs,
            now_logical,
            cons.suspect_ttl_secs,
        ) {
            Verdict::Stable => {
                view.counters.suspects_cleared += 1;
                if let Some(node) = view.tree.lookup_mut(&result.path) {
                    node.integrity_suspect = false;
                    node.suspect_until = None;
                }
            }
            Verdict::StillHot => {
                if let Some(node) = view.tree.lookup_mut(&result.path) {
                    node.mtime = observed_mtime;
                    if let Some(size) = result.size {
                        node.size = size;
                    }
                }
            }
            Verdict::Unknown => {}
        }
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;
