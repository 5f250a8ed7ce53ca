// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_protocol_documentation() {
    let c = Consistency::default();
    assert_eq!(c.heartbeat_secs, 10.0);
    assert_eq!(c.leader_timeout_secs(), 30.0);
    assert_eq!(c.hot_window_secs, 60.0);
    assert_eq!(c.suspect_ttl_secs, 30.0);
    assert_eq!(c.trust_window_secs, 1.0);
    assert_eq!(c.batch_size, 1000);
    assert_eq!(c.batch_interval_ms, 200);
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let c: Consistency = toml::from_str("hot_window_secs = 5.0").unwrap();
    assert_eq!(c.hot_window_secs, 5.0);
    assert_eq!(c.heartbeat_secs, 10.0);
}

#[test]
fn leader_timeout_follows_factor() {
    let c: Consistency =
        toml::from_str("heartbeat_secs = 2.0\nleader_timeout_factor = 4.0").unwrap();
    assert_eq!(c.leader_timeout_secs(), 8.0);
}
