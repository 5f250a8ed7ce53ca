// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory hierarchical index.
//!
//! Nodes are stored in a flat map keyed by full path, which doubles as the
//! `O(1)` point-query index. Hierarchy lives in each directory's ordered
//! child-name set; parents are reached through the path, never through
//! owning back-pointers. Every node's parent exists: ancestors are
//! materialized as directories on insert.

use std::collections::HashMap;

use fustor_core::{path, AgentId};
use fustor_wire::NodeView;
use indexmap::IndexSet;

/// Stat-shaped payload applied to a node on upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeAttrs {
    pub is_dir: bool,
    pub size: u64,
    pub mtime: f64,
    pub ctime: Option<f64>,
}

/// One tree entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: f64,
    pub ctime: Option<f64>,
    pub last_agent_id: Option<AgentId>,
    /// URI of the source that produced this node, e.g. `fs://nfs-projects`.
    pub source_uri: Option<String>,
    /// True once any realtime event touched this path.
    pub seen_realtime: bool,
    pub integrity_suspect: bool,
    pub suspect_until: Option<f64>,
    /// Set when an audit cycle finished without any agent observing this path.
    pub agent_missing: bool,
    pub blind_spot_since: Option<f64>,
    /// Logical time of the last event that touched this node.
    pub last_seen: f64,
    children: IndexSet<String>,
}

impl Node {
    fn new(path: String, attrs: NodeAttrs) -> Self {
        let name = path::node_name(&path).to_string();
        Self {
            path,
            name,
            is_dir: attrs.is_dir,
            size: attrs.size,
            mtime: attrs.mtime,
            ctime: attrs.ctime,
            last_agent_id: None,
            source_uri: None,
            seen_realtime: false,
            integrity_suspect: false,
            suspect_until: None,
            agent_missing: false,
            blind_spot_since: None,
            last_seen: 0.0,
            children: IndexSet::new(),
        }
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }
}

/// The arborescence for one view.
#[derive(Debug)]
pub struct Tree {
    nodes: HashMap<String, Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            path::ROOT.to_string(),
            Node::new(path::ROOT.to_string(), NodeAttrs { is_dir: true, ..NodeAttrs::default() }),
        );
        Self { nodes }
    }

    /// Total entries excluding the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| !n.is_dir).count()
    }

    pub fn dir_count(&self) -> usize {
        // Root is structural, not counted.
        self.nodes.values().filter(|n| n.is_dir).count() - 1
    }

    pub fn lookup(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.nodes.get_mut(path)
    }

    /// Insert or update the node at `path`, materializing missing ancestor
    /// directories. Returns the updated node.
    pub fn upsert(&mut self, target: &str, attrs: NodeAttrs) -> &mut Node {
        for ancestor in path::ancestors(target) {
            if !self.nodes.contains_key(&ancestor) {
                self.insert_shell_dir(&ancestor);
            }
        }
        if let Some(parent) = path::parent(target) {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.insert(path::node_name(target).to_string());
            }
        }
        let entry = self
            .nodes
            .entry(target.to_string())
            .or_insert_with(|| Node::new(target.to_string(), attrs));
        entry.is_dir = attrs.is_dir;
        entry.size = attrs.size;
        entry.mtime = attrs.mtime;
        if attrs.ctime.is_some() {
            entry.ctime = attrs.ctime;
        }
        entry
    }

    fn insert_shell_dir(&mut self, dir: &str) {
        if let Some(parent) = path::parent(dir) {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.insert(path::node_name(dir).to_string());
            }
        }
        self.nodes.insert(
            dir.to_string(),
            Node::new(dir.to_string(), NodeAttrs { is_dir: true, ..NodeAttrs::default() }),
        );
    }

    /// Remove the node at `path` and its entire subtree. Returns every
    /// removed path (empty when the path was unknown). The root is never
    /// removed.
    pub fn remove(&mut self, target: &str) -> Vec<String> {
        if target == path::ROOT || !self.nodes.contains_key(target) {
            return Vec::new();
        }
        if let Some(parent) = path::parent(target) {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.shift_remove(path::node_name(target));
            }
        }
        let mut removed = Vec::new();
        let mut stack = vec![target.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                let base = if current == path::ROOT { "" } else { current.as_str() };
                for child in &node.children {
                    stack.push(format!("{base}/{child}"));
                }
                removed.push(current);
            }
        }
        removed
    }

    /// Paths of every node under (and including) `root`, excluding the
    /// synthetic tree root itself.
    pub fn paths_under(&self, root: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|p| p.as_str() != path::ROOT && path::is_under(p, root))
            .cloned()
            .collect()
    }

    /// Project the subtree at `path` for a query response.
    pub fn subtree(
        &self,
        target: &str,
        recursive: bool,
        max_depth: Option<usize>,
        only_path: bool,
    ) -> Option<NodeView> {
        let node = self.nodes.get(target)?;
        let depth_cap = if recursive { max_depth } else { Some(1) };
        Some(self.project(node, depth_cap, only_path))
    }

    fn project(&self, node: &Node, depth: Option<usize>, only_path: bool) -> NodeView {
        let children = if depth == Some(0) {
            Vec::new()
        } else {
            let next = depth.map(|d| d - 1);
            let mut names: Vec<&str> = node.child_names().collect();
            names.sort_unstable();
            names
                .into_iter()
                .filter_map(|name| {
                    let child_path = if node.path == path::ROOT {
                        format!("/{name}")
                    } else {
                        format!("{}/{name}", node.path)
                    };
                    self.nodes.get(&child_path)
                })
                .map(|child| self.project(child, next, only_path))
                .collect()
        };
        if only_path {
            NodeView {
                path: node.path.clone(),
                name: node.name.clone(),
                is_dir: node.is_dir,
                size: 0,
                mtime: 0.0,
                ctime: None,
                last_agent_id: None,
                source_uri: None,
                integrity_suspect: false,
                agent_missing: false,
                children,
            }
        } else {
            NodeView {
                path: node.path.clone(),
                name: node.name.clone(),
                is_dir: node.is_dir,
                size: node.size,
                mtime: node.mtime,
                ctime: node.ctime,
                last_agent_id: node.last_agent_id.clone(),
                source_uri: node.source_uri.clone(),
                integrity_suspect: node.integrity_suspect,
                agent_missing: node.agent_missing,
                children,
            }
        }
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
