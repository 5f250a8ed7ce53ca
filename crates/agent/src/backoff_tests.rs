// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn nominal_doubles_until_cap() {
    let b = Backoff::default();
    assert_eq!(b.nominal(1), Duration::from_secs(1));
    assert_eq!(b.nominal(2), Duration::from_secs(2));
    assert_eq!(b.nominal(6), Duration::from_secs(32));
    assert_eq!(b.nominal(7), Duration::from_secs(60), "capped");
    assert_eq!(b.nominal(20), Duration::from_secs(60));
}

#[test]
fn jittered_delay_stays_within_band() {
    let mut b = Backoff::default();
    for attempt in 1..=8 {
        let delay = b.next().expect("attempts remain");
        let nominal = b.nominal(attempt);
        assert!(delay <= nominal, "attempt {attempt}: {delay:?} > {nominal:?}");
        assert!(delay >= nominal.mul_f64(0.5), "attempt {attempt}: {delay:?} too small");
    }
}

#[test]
fn exhausts_after_max_attempts() {
    let mut b = Backoff::new(Duration::from_millis(1), Duration::from_millis(10), 3);
    assert!(b.next().is_some());
    assert!(b.next().is_some());
    assert!(b.next().is_some());
    assert!(b.next().is_none(), "attempt budget spent");
}

#[test]
fn reset_restores_budget() {
    let mut b = Backoff::new(Duration::from_millis(1), Duration::from_millis(10), 1);
    assert!(b.next().is_some());
    assert!(b.next().is_none());
    b.reset();
    assert!(b.next().is_some());
}
