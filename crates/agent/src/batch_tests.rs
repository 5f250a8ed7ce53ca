// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fustor_core::{AgentId, EventKind, FsRow, MessageSource, SessionId};

fn event(i: u64) -> Event {
    FsRow::new(format!("/f{i}"), 1, 10.0, false).into_event(
        EventKind::Insert,
        MessageSource::Realtime,
        i,
        SessionId::new("ses-1"),
        AgentId::new("a"),
    )
}

#[test]
fn push_returns_batch_at_capacity() {
    let mut batcher = Batcher::new(3);
    assert!(batcher.push(event(1)).is_none());
    assert!(batcher.push(event(2)).is_none());
    let batch = batcher.push(event(3)).expect("full batch");
    assert_eq!(batch.len(), 3);
    assert!(batcher.is_empty());
}

#[test]
fn take_drains_partial_batch() {
    let mut batcher = Batcher::new(100);
    batcher.push(event(1));
    batcher.push(event(2));
    let batch = batcher.take();
    assert_eq!(batch.len(), 2);
    assert!(batcher.take().is_empty());
}

#[test]
fn order_is_preserved() {
    let mut batcher = Batcher::new(10);
    for i in 1..=5 {
        batcher.push(event(i));
    }
    let indices: Vec<u64> = batcher.take().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);
}
