// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_constructor_fills_fields() {
    let resp = Response::error(ErrorKind::NotLeader, "followers may not audit");
    match resp {
        Response::Error { kind, message } => {
            assert_eq!(kind, ErrorKind::NotLeader);
            assert_eq!(message, "followers may not audit");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn unavailable_reason_serializes_snake_case() {
    let json =
        serde_json::to_value(Response::Unavailable { reason: NotReadyReason::SnapshotIncomplete })
            .unwrap();
    assert_eq!(json["reason"], "snapshot_incomplete");
}

#[test]
fn ingested_omits_empty_dropped_list() {
    let json = serde_json::to_string(&Response::Ingested {
        committed_index: 10,
        accepted: 5,
        dropped: vec![],
        role: Role::Leader,
        snapshot_needed: false,
    })
    .unwrap();
    assert!(!json.contains("dropped"));
}
