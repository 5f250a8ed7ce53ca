// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suspect tracking for files likely still being written.
//!
//! An event whose mtime sits within the hot window of logical now marks
//! its path suspect; size and mtime are treated as unstable until a
//! realtime event, a sentinel confirmation, or the TTL clears it.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SuspectEntry {
    pub path: String,
    pub first_seen: f64,
    /// mtime at the moment of (last) marking; sentinel compares against this.
    pub mtime_at_mark: f64,
    pub expires_at: f64,
}

/// Outcome of a sentinel observation against a suspect entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// mtime stable within epsilon; suspect cleared.
    Stable,
    /// mtime moved; entry refreshed, still suspect.
    StillHot,
    /// No suspect entry for the path (stale task).
    Unknown,
}

#[derive(Debug, Default)]
pub struct SuspectSet {
    map: HashMap<String, SuspectEntry>,
}

impl SuspectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&SuspectEntry> {
        self.map.get(path)
    }

    /// Mark (or re-mark) a path. Keeps the original `first_seen`.
    pub fn mark(&mut self, path: &str, mtime: f64, now: f64, ttl: f64) {
        self.map
            .entry(path.to_string())
            .and_modify(|e| {
                e.mtime_at_mark = mtime;
                e.expires_at = now + ttl;
            })
            .or_insert_with(|| SuspectEntry {
                path: path.to_string(),
                first_seen: now,
                mtime_at_mark: mtime,
                expires_at: now + ttl,
            });
    }

    pub fn clear(&mut self, path: &str) -> bool {
        self.map.remove(path).is_some()
    }

    /// Apply one sentinel observation.
    pub fn confirm(
        &mut self,
        path: &str,
        observed_mtime: f64,
        epsilon: f64,
        now: f64,
        ttl: f64,
    ) -> Verdict {
        let Some(entry) = self.map.get_mut(path) else {
            return Verdict::Unknown;
        };
        if (observed_mtime - entry.mtime_at_mark).abs() <= epsilon {
            self.map.remove(path);
            Verdict::Stable
        } else {
            entry.mtime_at_mark = observed_mtime;
            entry.expires_at = now + ttl;
            Verdict::StillHot
        }
    }

    /// Drop entries past their TTL, returning the cleared paths.
    pub fn purge_expired(&mut self, now: f64) -> Vec<String> {
        let expired: Vec<String> = self
            .map
            .values()
            .filter(|e| e.expires_at < now)
            .map(|e| e.path.clone())
            .collect();
        for path in &expired {
            self.map.remove(path);
        }
        expired
    }

    /// Paths needing sentinel verification.
    pub fn paths(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "suspect_tests.rs"]
mod tests;
