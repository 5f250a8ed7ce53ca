// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

#[test]
fn session_id_generate_has_prefix_and_length() {
    let id = SessionId::generate();
    assert!(id.as_str().starts_with("ses-"));
    assert_eq!(id.as_str().len(), 23);
}

#[test]
fn session_ids_are_unique() {
    let a = SessionId::generate();
    let b = SessionId::generate();
    assert_ne!(a, b);
}

#[test]
fn ids_compare_against_str() {
    let pipe = PipeId::new("nfs-share");
    assert_eq!(pipe, "nfs-share");
    assert_eq!(pipe.to_string(), "nfs-share");
}

#[test]
fn ids_key_maps_by_str() {
    let mut map = HashMap::new();
    map.insert(AgentId::new("node-a"), 1u64);
    assert_eq!(map.get("node-a"), Some(&1));
}

#[test]
fn task_id_convention() {
    let t = task_id(&AgentId::new("node-a"), &PipeId::new("share"));
    assert_eq!(t, "node-a:share");
}

#[test]
fn ids_roundtrip_serde() {
    let view = ViewId::new("v1");
    let json = serde_json::to_string(&view).unwrap();
    assert_eq!(json, "\"v1\"");
    let back: ViewId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, view);
}
