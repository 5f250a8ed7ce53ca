// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skew-tolerant logical clock driven by observed event timestamps.
//!
//! Every processed event contributes `diff = wall − mtime` to a per-session
//! ring buffer and a global histogram. The histogram's mode is the elected
//! global skew; `baseline = wall − skew` is the clock's view of "now". An
//! mtime inside the trust window around the baseline advances the clock; an
//! mtime beyond it is future-protected so one misconfigured node (hours
//! ahead) cannot make every other node's updates look stale.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::id::SessionId;

/// Ring buffer size per session.
const RING_CAP: usize = 64;

/// Histogram bucket width in seconds. Diffs are quantized to deciseconds so
/// near-identical skews from one node land in one bucket.
const BUCKET_SECS: f64 = 0.1;

/// Sentinel for "no accepted baseline yet" (NaN bit pattern, never a real value).
const UNSET: u64 = u64::MAX;

/// Verdict for one observed event timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Watermark {
    /// Skew-corrected view of "now" at observation time.
    pub baseline: f64,
    /// The mtime to store in the tree: the original, or the baseline when
    /// future-protected. Precedence checks still use the original mtime.
    pub storage_mtime: f64,
    /// True when the mtime exceeded `baseline + trust_window`.
    pub future_dated: bool,
    /// True when the mtime fell inside the trust window and advanced `now()`.
    pub accepted: bool,
}

#[derive(Default)]
struct Inner {
    rings: HashMap<SessionId, VecDeque<i64>>,
    histogram: HashMap<i64, usize>,
    skew_buckets: i64,
}

/// Per-process skew estimator. Writes take the internal lock; `now()` is a
/// lock-free read of the last accepted baseline.
pub struct SkewEstimator {
    trust_window: f64,
    inner: Mutex<Inner>,
    value: AtomicU64,
}

impl SkewEstimator {
    pub fn new(trust_window: f64) -> Self {
        Self {
            trust_window,
            inner: Mutex::new(Inner::default()),
            value: AtomicU64::new(UNSET),
        }
    }

    /// Feed one event timestamp and classify it.
    pub fn observe(&self, session: &SessionId, mtime: f64, wall: f64) -> Watermark {
        let bucket = quantize(wall - mtime);
        let skew = {
            let mut inner = self.inner.lock();
            let ring = inner.rings.entry(session.clone()).or_default();
            ring.push_back(bucket);
            let ejected = if ring.len() > RING_CAP { ring.pop_front() } else { None };
            if let Some(old) = ejected {
                decrement(&mut inner.histogram, old);
            }
            *inner.histogram.entry(bucket).or_insert(0) += 1;
            inner.skew_buckets = elect_mode(&inner.histogram).unwrap_or(0);
            inner.skew_buckets as f64 * BUCKET_SECS
        };

        let baseline = wall - skew;
        let future_dated = mtime > baseline + self.trust_window;
        let accepted = mtime >= baseline - self.trust_window && !future_dated;
        if accepted {
            self.value.store(baseline.to_bits(), Ordering::Relaxed);
        }
        Watermark {
            baseline,
            storage_mtime: if future_dated { baseline } else { mtime },
            future_dated,
            accepted,
        }
    }

    /// Most recent accepted baseline; falls back to the supplied wall clock
    /// before any sample has been accepted.
    pub fn now(&self, wall_fallback: f64) -> f64 {
        let bits = self.value.load(Ordering::Relaxed);
        if bits == UNSET {
            wall_fallback
        } else {
            f64::from_bits(bits)
        }
    }

    /// Current skew estimate in seconds.
    pub fn global_skew(&self) -> f64 {
        self.inner.lock().skew_buckets as f64 * BUCKET_SECS
    }

    /// Drop a closed session's samples from the histogram.
    pub fn forget_session(&self, session: &SessionId) {
        let mut inner = self.inner.lock();
        if let Some(ring) = inner.rings.remove(session) {
            for bucket in ring {
                decrement(&mut inner.histogram, bucket);
            }
            inner.skew_buckets = elect_mode(&inner.histogram).unwrap_or(0);
        }
    }
}

fn quantize(diff: f64) -> i64 {
    (diff / BUCKET_SECS).round() as i64
}

fn decrement(histogram: &mut HashMap<i64, usize>, bucket: i64) {
    if let Some(count) = histogram.get_mut(&bucket) {
        *count -= 1;
        if *count == 0 {
            histogram.remove(&bucket);
        }
    }
}

/// Mode of the histogram. Ties prefer the less-skewed estimate: smaller
/// absolute diff first, then the smaller signed value for determinism.
fn elect_mode(histogram: &HashMap<i64, usize>) -> Option<i64> {
    histogram
        .iter()
        .max_by(|(ba, ca), (bb, cb)| {
            ca.cmp(cb)
                .then(bb.abs().cmp(&ba.abs()))
                .then(bb.cmp(ba))
        })
        .map(|(bucket, _)| *bucket)
}

#[cfg(test)]
#[path = "logical_clock_tests.rs"]
mod tests;
