// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable rendering for query responses.

use fustor_wire::{NodeView, SessionSummary, ViewStats};

/// Render a subtree as an indented listing.
pub fn render_tree(root: &NodeView, only_path: bool) -> String {
    let mut out = String::new();
    render_node(root, 0, only_path, &mut out);
    out
}

fn render_node(node: &NodeView, depth: usize, only_path: bool, out: &mut String) {
    let indent = "  ".repeat(depth);
    let marker = if node.is_dir { "/" } else { "" };
    if only_path {
        out.push_str(&format!("{indent}{}{marker}\n", node.name));
    } else {
        let mut flags = String::new();
        if node.integrity_suspect {
            flags.push_str(" [suspect]");
        }
        if node.agent_missing {
            flags.push_str(" [agent-missing]");
        }
        out.push_str(&format!(
            "{indent}{}{marker}  {} bytes  mtime {:.3}{flags}\n",
            node.name, node.size, node.mtime
        ));
    }
    for child in &node.children {
        render_node(child, depth + 1, only_path, out);
    }
}

/// Render view counters as a two-column block.
pub fn render_stats(stats: &ViewStats) -> String {
    let mut out = String::new();
    let ready = if stats.ready {
        "ready".to_string()
    } else {
        match stats.not_ready_reason {
            Some(reason) => format!("not ready ({reason})"),
            None => "not ready".to_string(),
        }
    };
    out.push_str(&format!("status:           {ready}\n"));
    out.push_str(&format!("nodes:            {} ({} dirs, {} files)\n", stats.nodes, stats.dirs, stats.files));
    out.push_str(&format!("tombstones:       {}\n", stats.tombstones));
    out.push_str(&format!("suspects:         {}\n", stats.suspects));
    out.push_str(&format!("blind spots:      {}\n", stats.blind_spots));
    out.push_str(&format!("events accepted:  {}\n", stats.events_accepted));
    out.push_str(&format!("events dropped:   {}\n", stats.events_dropped));
    if !stats.drops_by_reason.is_empty() {
        let mut reasons: Vec<_> = stats.drops_by_reason.iter().collect();
        reasons.sort();
        for (reason, count) in reasons {
            out.push_str(&format!("  {reason}: {count}\n"));
        }
    }
    out.push_str(&format!("last apply:       {} µs\n", stats.last_apply_micros));
    out
}

/// Render session summaries, one per line.
pub fn render_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "no live sessions\n".to_string();
    }
    let mut out = String::new();
    for s in sessions {
        out.push_str(&format!(
            "{}  pipe={}  agent={}  {}  age={:.0}s  committed={}\n",
            s.session_id, s.pipe_id, s.agent_id, s.role, s.age_secs, s.committed_index
        ));
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
