// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn sample_row() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "path": "/share/a.txt",
        "file_name": "a.txt",
        "size": 10,
        "modified_time": 123.0,
    }) else {
        unreachable!("literal is an object")
    };
    map
}

#[test]
fn empty_mapping_is_identity() {
    let mapping = FieldMapping::default();
    let row = sample_row();
    assert!(mapping.is_passthrough());
    assert_eq!(mapping.project(row.clone()), row);
}

#[test]
fn mapping_projects_and_renames() {
    let mapping = FieldMapping::new(vec![
        FieldRule { from: "path".into(), to: "path".into() },
        FieldRule { from: "modified_time".into(), to: "mtime".into() },
    ]);
    let out = mapping.project(sample_row());
    assert_eq!(out.len(), 2);
    assert_eq!(out["path"], json!("/share/a.txt"));
    assert_eq!(out["mtime"], json!(123.0));
    assert!(!out.contains_key("size"));
}

#[test]
fn output_keys_subset_of_targets() {
    let mapping = FieldMapping::new(vec![
        FieldRule { from: "missing".into(), to: "gone".into() },
        FieldRule { from: "size".into(), to: "bytes".into() },
    ]);
    let out = mapping.project(sample_row());
    assert_eq!(out.len(), 1);
    assert!(out.contains_key("bytes"));
    assert!(!out.contains_key("gone"));
}

#[test]
fn mapping_deserializes_from_rule_list() {
    let mapping: FieldMapping =
        serde_json::from_str(r#"[{"from":"modified_time","to":"mtime"}]"#).unwrap();
    assert!(!mapping.is_passthrough());
}
