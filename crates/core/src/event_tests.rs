// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn row() -> FsRow {
    FsRow::new("/share/a/b.txt", 512, 1000.5, false)
}

#[test]
fn precedence_order() {
    assert!(MessageSource::Realtime.precedence() > MessageSource::Audit.precedence());
    assert!(MessageSource::Audit.precedence() > MessageSource::Snapshot.precedence());
}

#[test]
fn row_derives_name_and_parent() {
    let r = row();
    assert_eq!(r.file_name, "b.txt");
    assert_eq!(r.parent_path.as_deref(), Some("/share/a"));
}

#[test]
fn row_into_event_carries_fields() {
    let ev = row().with_parent_mtime(999.0).into_event(
        EventKind::Update,
        MessageSource::Audit,
        7,
        SessionId::new("ses-1"),
        AgentId::new("node-a"),
    );
    assert_eq!(ev.schema, FS_SCHEMA);
    assert_eq!(ev.path, "/share/a/b.txt");
    assert_eq!(ev.mtime, 1000.5);
    assert_eq!(ev.parent_mtime, Some(999.0));
    assert_eq!(ev.index, 7);
    assert_eq!(ev.source, MessageSource::Audit);
}

#[test]
fn event_kind_wire_form_is_uppercase() {
    assert_eq!(serde_json::to_string(&EventKind::Insert).unwrap(), "\"INSERT\"");
    assert_eq!(serde_json::to_string(&EventKind::Delete).unwrap(), "\"DELETE\"");
}

#[test]
fn message_source_wire_form_is_lowercase() {
    assert_eq!(serde_json::to_string(&MessageSource::Realtime).unwrap(), "\"realtime\"");
    let back: MessageSource = serde_json::from_str("\"snapshot\"").unwrap();
    assert_eq!(back, MessageSource::Snapshot);
}

#[test]
fn event_serde_roundtrip() {
    let ev = row().into_event(
        EventKind::Insert,
        MessageSource::Realtime,
        1,
        SessionId::new("ses-1"),
        AgentId::new("node-a"),
    );
    let json = serde_json::to_string(&ev).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ev);
}
