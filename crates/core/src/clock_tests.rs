// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn system_clock_epoch_is_positive() {
    let clock = SystemClock;
    assert!(clock.epoch_secs() > 0.0);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let e1 = clock.epoch_secs();
    clock.advance(Duration::from_secs(60));
    let t2 = clock.now();
    assert!(t2.duration_since(t1) >= Duration::from_secs(60));
    assert!((clock.epoch_secs() - e1 - 60.0).abs() < 1e-9);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let e1 = clock1.epoch_secs();
    clock2.advance(Duration::from_secs(30));
    assert!(clock1.epoch_secs() >= e1 + 30.0);
}

#[test]
fn fake_clock_set_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_secs(42.5);
    assert_eq!(clock.epoch_secs(), 42.5);
}
