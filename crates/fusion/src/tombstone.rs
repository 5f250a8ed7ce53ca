// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tombstones: records of realtime deletes that block late resurrections.
//!
//! A live tombstone is lifted in exactly three ways: a realtime event at
//! the path, an audit cycle that does not observe the path, or TTL expiry.
//! Until one of those happens no scan row re-inserts the path. At most one
//! tombstone per path; a live tombstone and a live node never coexist.

use std::collections::{HashMap, HashSet};

use fustor_core::MessageSource;

#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    pub path: String,
    /// mtime carried by the realtime DELETE that created this tombstone.
    pub deleted_mtime: f64,
    pub deleted_at: f64,
    pub expires_at: f64,
}

#[derive(Debug, Default)]
pub struct TombstoneMap {
    map: HashMap<String, Tombstone>,
}

impl TombstoneMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Tombstone> {
        self.map.get(path)
    }

    /// Record a realtime delete. Replaces any prior tombstone at the path.
    pub fn insert(&mut self, path: &str, deleted_mtime: f64, now: f64, ttl: f64) {
        self.map.insert(
            path.to_string(),
            Tombstone {
                path: path.to_string(),
                deleted_mtime,
                deleted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    pub fn remove(&mut self, path: &str) -> Option<Tombstone> {
        self.map.remove(path)
    }

    /// Whether a live tombstone forbids applying this event.
    ///
    /// Realtime events always pass; snapshot/audit events never do, no
    /// matter their mtime — clearing is reserved for the three lifting
    /// mechanisms above.
    pub fn blocks(&self, path: &str, source: MessageSource) -> bool {
        source != MessageSource::Realtime && self.map.contains_key(path)
    }

    /// Purge tombstones past their TTL, except those still referenced by a
    /// blind-spot entry (the path may belong to an agentless writer; keep
    /// blocking resurrections until the cycle resolves).
    pub fn purge_expired(&mut self, now: f64, blind_spots: &HashSet<String>) -> usize {
        let before = self.map.len();
        // Inclusive: at the expiry instant the tombstone still blocks.
        self.map.retain(|path, t| t.expires_at >= now || blind_spots.contains(path));
        before - self.map.len()
    }

    /// Drop tombstones for paths an audit cycle did not observe: the path
    /// is confirmed gone from the source, so nothing is left to resurrect.
    pub fn retain_audit_observed(&mut self, observed: &HashSet<String>) -> usize {
        let before = self.map.len();
        self.map.retain(|path, _| observed.contains(path));
        before - self.map.len()
    }
}

#[cfg(test)]
#[path = "tombstone_tests.rs"]
mod tests;
