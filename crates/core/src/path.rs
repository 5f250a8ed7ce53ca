// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path helpers for the normalized `/`-separated form used in the tree.
//!
//! Tree paths are always absolute, never end in a slash (except the root
//! itself), and contain no empty or `.`/`..` segments.

/// The tree root.
pub const ROOT: &str = "/";

/// Normalize an arbitrary slash-separated path into tree form.
///
/// Empty input and `"/"` both normalize to the root. Repeated slashes and
/// trailing slashes are collapsed.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for seg in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        ROOT.to_string()
    } else {
        out
    }
}

/// Parent of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Final component of a normalized path; the root's name is `"/"`.
pub fn node_name(path: &str) -> &str {
    if path == ROOT {
        return ROOT;
    }
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Whether `path` equals `root` or sits beneath it.
pub fn is_under(path: &str, root: &str) -> bool {
    if root == ROOT {
        return true;
    }
    path == root || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

/// Every ancestor of a normalized path from the root downwards, excluding
/// the path itself.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = path;
    while let Some(p) = parent(cur) {
        out.push(p.to_string());
        cur = p;
    }
    out.reverse();
    out
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
