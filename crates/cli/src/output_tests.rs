// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn leaf(name: &str, size: u64) -> NodeView {
    NodeView {
        path: format!("/{name}"),
        name: name.to_string(),
        is_dir: false,
        size,
        mtime: 100.0,
        ctime: None,
        last_agent_id: None,
        source_uri: None,
        integrity_suspect: false,
        agent_missing: false,
        children: vec![],
    }
}

#[test]
fn tree_renders_indented_hierarchy() {
    let root = NodeView {
        path: "/".into(),
        name: "/".into(),
        is_dir: true,
        size: 0,
        mtime: 0.0,
        ctime: None,
        last_agent_id: None,
        source_uri: None,
        integrity_suspect: false,
        agent_missing: false,
        children: vec![leaf("a.txt", 3)],
    };
    let rendered = render_tree(&root, false);
    assert!(rendered.starts_with("//"));
    assert!(rendered.contains("  a.txt  3 bytes"));
}

#[test]
fn tree_marks_flags() {
    let mut node = leaf("hot.txt", 1);
    node.integrity_suspect = true;
    node.agent_missing = true;
    let rendered = render_tree(&node, false);
    assert!(rendered.contains("[suspect]"));
    assert!(rendered.contains("[agent-missing]"));
}

#[test]
fn only_path_renders_bare_names() {
    let rendered = render_tree(&leaf("a.txt", 3), true);
    assert_eq!(rendered, "a.txt\n");
}

#[test]
fn stats_reports_readiness_reason() {
    let stats = ViewStats {
        ready: false,
        not_ready_reason: Some(fustor_wire::NotReadyReason::NoLeader),
        ..Default::default()
    };
    let rendered = render_stats(&stats);
    assert!(rendered.contains("not ready (no_leader)"));
}

#[test]
fn sessions_renders_one_line_each() {
    use fustor_core::{AgentId, PipeId, SessionId};
    let sessions = vec![SessionSummary {
        session_id: SessionId::new("ses-1"),
        pipe_id: PipeId::new("share"),
        agent_id: AgentId::new("node-a"),
        role: fustor_wire::Role::Leader,
        age_secs: 12.0,
        committed_index: 42,
    }];
    let rendered = render_sessions(&sessions);
    assert!(rendered.contains("ses-1"));
    assert!(rendered.contains("leader"));
    assert!(rendered.contains("committed=42"));
    assert_eq!(render_sessions(&[]), "no live sessions\n");
}
